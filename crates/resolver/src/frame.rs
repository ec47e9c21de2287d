//! Reference runtime model of fabrication modes
//!
//! Generated injectors cache values the way [`Frame`] does: a `Scoped` value
//! lives in the frame that produced it, a `ContainerScoped` value lives in a
//! cell created by the root frame and shared by every descendant, and a
//! `Recurrent` value is produced on every call.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{FabricationMode, QualifiedType};
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// A fabricated value
pub type Instance = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Default)]
struct ContainerCell {
    values: DashMap<QualifiedType, Instance>,
}

#[derive(Debug)]
struct FrameInner {
    parent: Option<Frame>,
    depth: usize,
    scoped: DashMap<QualifiedType, Instance>,
    container: Arc<ContainerCell>,
}

/// One injector instance in a chain of nested injectors
#[derive(Debug, Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    /// A root frame owning a fresh container cell
    pub fn root() -> Self {
        Self {
            inner: Arc::new(FrameInner {
                parent: None,
                depth: 0,
                scoped: DashMap::new(),
                container: Arc::new(ContainerCell::default()),
            }),
        }
    }

    /// A child frame sharing this frame's container cell
    pub fn spawn(&self) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                parent: Some(self.clone()),
                depth: self.inner.depth + 1,
                scoped: DashMap::new(),
                container: Arc::clone(&self.inner.container),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Frame> {
        self.inner.parent.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// The frame at the top of the parent chain
    pub fn root_frame(&self) -> &Frame {
        let mut frame = self;
        while let Some(parent) = frame.parent() {
            frame = parent;
        }
        frame
    }

    pub fn shares_container_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.inner.container, &other.inner.container)
    }

    /// Produce a value of `ty` under `mode`.
    ///
    /// `make` receives this frame so it can fabricate its own dependencies.
    /// The cache lock is not held while `make` runs; if two threads race,
    /// the first stored value wins and both callers receive it.
    pub fn fabricate<F>(&self, ty: &QualifiedType, mode: FabricationMode, make: F) -> Instance
    where
        F: FnOnce(&Frame) -> Instance,
    {
        let cache = match mode {
            FabricationMode::Recurrent => return make(self),
            FabricationMode::Scoped => &self.inner.scoped,
            FabricationMode::ContainerScoped => &self.inner.container.values,
        };
        if let Some(value) = cache.get(ty) {
            trace!("frame[{}]: {} {} cached", self.depth(), mode, ty);
            return Arc::clone(value.value());
        }
        let value = make(self);
        let stored = cache.entry(ty.clone()).or_insert(value);
        Arc::clone(stored.value())
    }

    /// A value already cached for `ty` under `mode`, if any
    pub fn cached(&self, ty: &QualifiedType, mode: FabricationMode) -> Option<Instance> {
        let cache = match mode {
            FabricationMode::Recurrent => return None,
            FabricationMode::Scoped => &self.inner.scoped,
            FabricationMode::ContainerScoped => &self.inner.container.values,
        };
        cache.get(ty).map(|value| Arc::clone(value.value()))
    }
}
