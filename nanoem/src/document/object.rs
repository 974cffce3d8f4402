use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process wide identity of a document entity.
///
/// Identity never takes part in value equality, and cloning an entity hands out a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentParent {
    None,
    Document,
    Model,
    Accessory,
    Camera,
    Light,
    Gravity,
    SelfShadow,
}

#[derive(Debug)]
pub struct DocumentObject {
    pub index: i32,
    pub parent: DocumentParent,
    id: ObjectId,
}

impl DocumentObject {
    pub fn new(parent: DocumentParent) -> Self {
        Self {
            index: -1,
            parent,
            id: ObjectId::next(),
        }
    }

    pub fn with_index(parent: DocumentParent, index: i32) -> Self {
        Self {
            index,
            parent,
            id: ObjectId::next(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn detach(&mut self) {
        self.index = -1;
        self.parent = DocumentParent::None;
    }
}

impl Clone for DocumentObject {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parent: self.parent,
            id: ObjectId::next(),
        }
    }
}

impl PartialEq for DocumentObject {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.parent == other.parent
    }
}

/// Stable reference to an entity living in some owner's array: the recorded position plus identity.
pub struct Handle<T> {
    index: i32,
    id: ObjectId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn new(index: i32, id: ObjectId) -> Self {
        Self {
            index,
            id,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("id", &self.id)
            .finish()
    }
}

/// Anything addressable by a [`Handle`].
pub trait Identified: Sized {
    fn handle_index(&self) -> i32;
    fn object_id(&self) -> ObjectId;

    fn handle(&self) -> Handle<Self> {
        Handle::new(self.handle_index(), self.object_id())
    }

    fn matches(&self, handle: Handle<Self>) -> bool {
        self.handle_index() == handle.index() && self.object_id() == handle.id()
    }
}

/// Entities carrying a [`DocumentObject`] header.
pub trait DocumentEntity: Identified {
    fn object(&self) -> &DocumentObject;
    fn object_mut(&mut self) -> &mut DocumentObject;
}

#[macro_export]
macro_rules! impl_document_entity {
    ($typ: ty) => {
        impl $crate::document::object::Identified for $typ {
            fn handle_index(&self) -> i32 {
                self.object.index
            }

            fn object_id(&self) -> $crate::document::object::ObjectId {
                self.object.id()
            }
        }

        impl $crate::document::object::DocumentEntity for $typ {
            fn object(&self) -> &$crate::document::object::DocumentObject {
                &self.object
            }

            fn object_mut(&mut self) -> &mut $crate::document::object::DocumentObject {
                &mut self.object
            }
        }
    };
}

/// Position of the item referred by `handle`.
///
/// The recorded index is tried first and identity decides; a linear scan covers
/// items whose position drifted from their recorded index.
pub fn find_by_handle<T: Identified>(items: &[T], handle: Handle<T>) -> Option<usize> {
    let guess = usize::try_from(handle.index()).ok();
    if let Some(pos) = guess {
        if items.get(pos).map_or(false, |item| item.matches(handle)) {
            return Some(pos);
        }
    }
    items.iter().position(|item| item.matches(handle))
}
