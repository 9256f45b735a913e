//! # Erros de Classificação
//!
//! Toda falha é síncrona e aborta a chamada inteira: não existe modo de
//! resultado parcial. O montador de spans ([`crate::assembler`]) não tem
//! modos de falha próprios; os erros abaixo vêm dos recursos (modelo do
//! classificador e dados auxiliares do segmentador).

use std::io;

use thiserror::Error;

/// Erros reportados ao chamador de uma requisição de classificação.
#[derive(Error, Debug)]
pub enum NerError {
    /// O recurso não existe no armazenamento.
    #[error("resource not found: {id}")]
    NotFound { id: String },

    /// O chamador não tem permissão de leitura. Separado de `NotFound`
    /// porque a remediação é diferente.
    #[error("permission denied to read resource: {id}")]
    PermissionDenied { id: String },

    /// O identificador aponta para algo que não é um recurso binário (ex: um diretório).
    #[error("resource does not point to a binary resource: {id}")]
    WrongResourceType { id: String },

    /// Falha de leitura que não se encaixa nas categorias acima.
    #[error("error while reading resource {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: io::Error,
    },

    /// O recurso existe mas não pôde ser convertido numa instância carregada.
    #[error("could not deserialize resource {id}: {reason}")]
    Deserialize { id: String, reason: String },
}

impl NerError {
    /// Traduz um `io::Error` para a categoria correspondente.
    pub fn from_io(id: impl Into<String>, err: io::Error) -> Self {
        let id = id.into();
        match err.kind() {
            io::ErrorKind::NotFound => NerError::NotFound { id },
            io::ErrorKind::PermissionDenied => NerError::PermissionDenied { id },
            _ => NerError::Io { id, source: err },
        }
    }

    /// Identificador do recurso envolvido na falha.
    pub fn resource_id(&self) -> &str {
        match self {
            NerError::NotFound { id }
            | NerError::PermissionDenied { id }
            | NerError::WrongResourceType { id }
            | NerError::Io { id, .. }
            | NerError::Deserialize { id, .. } => id,
        }
    }
}

/// Alias de resultado usado em todo o crate.
pub type Result<T> = std::result::Result<T, NerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kinds_are_mapped() {
        let err = NerError::from_io("models/en.json", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, NerError::NotFound { .. }));

        let err = NerError::from_io("models/en.json", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, NerError::PermissionDenied { .. }));

        let err = NerError::from_io("models/en.json", io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, NerError::Io { .. }));
        assert_eq!(err.resource_id(), "models/en.json");
    }

    #[test]
    fn test_messages_name_the_resource() {
        let err = NerError::Deserialize {
            id: "models/en.json".into(),
            reason: "expected value".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not deserialize resource models/en.json: expected value"
        );
    }
}
