//! # Resolução de Recursos
//!
//! Um classificador é referenciado por um identificador opaco (ex:
//! `"/models/english.json"`). O [`ResourceStore`] resolve esse identificador
//! para os bytes do recurso e para o diretório de dados auxiliares que fica
//! ao lado dele (usado pelo segmentador).

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{NerError, Result};

/// Um recurso binário lido do armazenamento.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Identificador usado na requisição.
    pub id: String,
    /// Caminho resolvido.
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Armazenamento de onde modelos e dados auxiliares são lidos.
pub trait ResourceStore: Send + Sync {
    /// Lê o recurso binário identificado por `id`.
    fn fetch(&self, id: &str) -> Result<Resource>;

    /// Diretório que contém o recurso `id` (dados auxiliares ficam ali).
    fn data_dir(&self, id: &str) -> Result<PathBuf>;
}

/// Armazenamento em sistema de arquivos, com identificadores relativos a `root`.
///
/// Identificadores usam `/` como separador; uma `/` inicial é aceita e
/// componentes `..` são recusados (o recurso é tratado como inexistente).
#[derive(Debug, Clone)]
pub struct FsResourceStore {
    root: PathBuf,
}

impl FsResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(NerError::NotFound { id: id.to_string() });
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceStore for FsResourceStore {
    fn fetch(&self, id: &str) -> Result<Resource> {
        let path = self.resolve(id)?;
        let metadata = fs::metadata(&path).map_err(|e| NerError::from_io(id, e))?;
        if !metadata.is_file() {
            return Err(NerError::WrongResourceType { id: id.to_string() });
        }
        let bytes = fs::read(&path).map_err(|e| NerError::from_io(id, e))?;
        debug!(id, path = %path.display(), size = bytes.len(), "recurso lido");
        Ok(Resource {
            id: id.to_string(),
            path,
            bytes,
        })
    }

    fn data_dir(&self, id: &str) -> Result<PathBuf> {
        let path = self.resolve(id)?;
        Ok(path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_model() -> (tempfile::TempDir, FsResourceStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models/zh")).unwrap();
        fs::write(dir.path().join("models/zh/ner.json"), b"{}").unwrap();
        let store = FsResourceStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_fetch_with_and_without_leading_slash() {
        let (_dir, store) = store_with_model();
        let a = store.fetch("/models/zh/ner.json").unwrap();
        let b = store.fetch("models/zh/ner.json").unwrap();
        assert_eq!(a.bytes, b"{}");
        assert_eq!(a.path, b.path);
        assert_eq!(a.id, "/models/zh/ner.json");
    }

    #[test]
    fn test_missing_resource() {
        let (_dir, store) = store_with_model();
        let err = store.fetch("models/en.json").unwrap_err();
        assert!(matches!(err, NerError::NotFound { ref id } if id == "models/en.json"));
    }

    #[test]
    fn test_directory_is_wrong_type() {
        let (_dir, store) = store_with_model();
        let err = store.fetch("models/zh").unwrap_err();
        assert!(matches!(err, NerError::WrongResourceType { .. }));
    }

    #[test]
    fn test_parent_components_are_rejected() {
        let (_dir, store) = store_with_model();
        assert!(matches!(
            store.fetch("models/../../etc/passwd").unwrap_err(),
            NerError::NotFound { .. }
        ));
        assert!(matches!(store.fetch("/").unwrap_err(), NerError::NotFound { .. }));
    }

    #[test]
    fn test_data_dir_is_the_parent() {
        let (dir, store) = store_with_model();
        assert_eq!(
            store.data_dir("/models/zh/ner.json").unwrap(),
            dir.path().join("models/zh")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_resource_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, store) = store_with_model();
        let path = dir.path().join("models/zh/ner.json");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignora permissões de arquivo; o teste só vale para outros usuários
        if fs::read(&path).is_ok() {
            return;
        }
        let err = store.fetch("models/zh/ner.json").unwrap_err();
        assert!(matches!(err, NerError::PermissionDenied { .. }));
    }
}
