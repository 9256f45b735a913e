//! # Cache de Instâncias Carregadas
//!
//! Carregar um classificador é caro, então as instâncias ficam em cache por
//! identificador de recurso. O cache pertence à aplicação hospedeira e é
//! injetado no serviço por `Arc`; o montador de spans nunca o toca.
//!
//! ## Carga única por chave (single-flight)
//!
//! Cada chave tem seu próprio slot protegido por um `Mutex`. A primeira
//! requisição segura o lock do slot enquanto carrega; requisições
//! concorrentes para a mesma chave esperam e reutilizam o resultado. Chaves
//! diferentes carregam em paralelo. Uma carga que falha não grava nada e o
//! erro vai direto ao chamador; o slot vazio sai do mapa junto. Entradas
//! existentes só saem por [`ResourceCache::evict`] ou [`ResourceCache::clear`],
//! que esperam a carga em andamento da chave terminar.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::Result;

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

/// Cache de instâncias por identificador, com carga única por chave.
pub struct ResourceCache<T: ?Sized> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: ?Sized> ResourceCache<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Devolve a instância de `key`, carregando-a com `load` se necessário.
    pub fn get_or_load<F>(&self, key: &str, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        loop {
            let slot = {
                let mut slots = lock(&self.slots);
                Arc::clone(slots.entry(key.to_string()).or_default())
            };

            let mut guard = lock(&slot);
            if let Some(value) = guard.as_ref() {
                debug!(key, "cache hit");
                return Ok(Arc::clone(value));
            }
            // O slot foi descartado enquanto esperávamos (falha ou evict)
            if !self.is_current(key, &slot) {
                continue;
            }

            info!(key, "carregando recurso");
            return match load() {
                Ok(value) => {
                    *guard = Some(Arc::clone(&value));
                    Ok(value)
                }
                Err(err) => {
                    self.detach(key, &slot);
                    Err(err)
                }
            };
        }
    }

    /// Instância já carregada, sem disparar carga.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let guard = lock(&slot);
        guard.clone()
    }

    /// Remove a instância de `key`. Devolve `true` se havia uma carregada.
    ///
    /// Uma carga em andamento para a mesma chave termina antes da remoção.
    pub fn evict(&self, key: &str) -> bool {
        let Some(slot) = lock(&self.slots).get(key).cloned() else {
            return false;
        };
        let mut guard = lock(&slot);
        let evicted = guard.take().is_some();
        self.detach(key, &slot);
        evicted
    }

    pub fn clear(&self) {
        let entries: Vec<(String, Slot<T>)> = lock(&self.slots)
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();
        for (key, slot) in entries {
            let mut guard = lock(&slot);
            guard.take();
            self.detach(&key, &slot);
        }
    }

    /// Número de instâncias carregadas.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<T>> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> ResourceCache<T> {
    fn is_current(&self, key: &str, slot: &Slot<T>) -> bool {
        lock(&self.slots)
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Tira `slot` do mapa se ele ainda for o slot de `key`. Quem chama
    /// segura o lock do slot; a ordem é sempre slot e depois mapa.
    fn detach(&self, key: &str, slot: &Slot<T>) {
        let mut slots = lock(&self.slots);
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }
}

impl<T: ?Sized> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Um lock envenenado ainda guarda um estado consistente: o slot só é
/// escrito depois que a carga termina.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
