use crate::pipeline::ResourceHandle;
use std::collections::HashMap;

/// In-process stand-in for browser object URLs: encoded bytes addressable
/// by a `blob:` handle until revoked.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: HashMap<ResourceHandle, Vec<u8>>,
    next: u64,
}

impl ResourceRegistry {
    pub fn create(&mut self, bytes: Vec<u8>) -> ResourceHandle {
        self.next += 1;
        let handle = ResourceHandle::new(format!("blob:mosaica/{}", self.next));
        self.resources.insert(handle.clone(), bytes);
        handle
    }

    pub fn get(&self, handle: &ResourceHandle) -> Option<&[u8]> {
        self.resources.get(handle).map(Vec::as_slice)
    }

    /// Release a handle. Revoking twice is harmless.
    pub fn revoke(&mut self, handle: &ResourceHandle) -> bool {
        self.resources.remove(handle).is_some()
    }

    /// Handles created and not yet revoked.
    pub fn live(&self) -> usize {
        self.resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_revocable() {
        let mut registry = ResourceRegistry::default();
        let a = registry.create(vec![1]);
        let b = registry.create(vec![2]);
        assert_ne!(a, b);
        assert_eq!(registry.get(&b), Some(&[2u8][..]));
        assert_eq!(registry.live(), 2);

        assert!(registry.revoke(&a));
        assert!(!registry.revoke(&a));
        assert!(registry.get(&a).is_none());
        assert_eq!(registry.live(), 1);
    }
}
