//! Platform resources handed to backends.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use vidcap_ipc::CaptureTarget;

use crate::{BackendFactory, CaptureResult, CapturerBackend};

/// Opaque bag of platform handles plus the capability to build backends.
///
/// Read-only once shared. Handles are keyed by type, so a backend asks for
/// the handle it understands (a GPU device, a window handle, a format
/// override) and ignores the rest.
#[derive(Clone)]
pub struct PlatformResources {
    factory: Arc<dyn BackendFactory>,
    handles: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PlatformResources {
    /// Create resources backed by the given factory.
    pub fn new(factory: impl BackendFactory + 'static) -> Self {
        Self::from_factory(Arc::new(factory))
    }

    /// Create resources from a shared factory.
    pub fn from_factory(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            handles: HashMap::new(),
        }
    }

    /// Attach a platform handle, replacing any previous handle of that type.
    pub fn with_handle<T: Any + Send + Sync>(mut self, handle: T) -> Self {
        self.handles.insert(TypeId::of::<T>(), Arc::new(handle));
        self
    }

    /// Look up a platform handle by type.
    pub fn handle<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.handles
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|handle| handle.downcast::<T>().ok())
    }

    /// Build a backend for `target` using the platform factory.
    pub fn create_backend(&self, target: &CaptureTarget) -> CaptureResult<Box<dyn CapturerBackend>> {
        self.factory.create(target, self)
    }
}

impl std::fmt::Debug for PlatformResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformResources")
            .field("handles", &self.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use vidcap_ipc::SourceFormat;

    use super::*;
    use crate::synthetic::SyntheticFactory;

    #[test]
    fn test_handle_lookup_by_type() {
        let format = SourceFormat {
            width: 64,
            height: 32,
            fps: 10,
        };
        let resources = PlatformResources::new(SyntheticFactory::default()).with_handle(format);

        assert_eq!(resources.handle::<SourceFormat>().as_deref(), Some(&format));
        assert!(resources.handle::<String>().is_none());
    }
}
