/// Implements the shared-handle boilerplate for a GPU object wrapper.
///
/// The wrapper must be a tuple struct around `Arc<$inner<B>>`, and `$inner` must have `id`,
/// `raw` (a `ManuallyDrop` of the backend object) and `on_drop` fields. When the last handle
/// is dropped the backend object is sent to the garbage collector under `Garbage::$kind`.
macro_rules! gpu_handle {
    ($name:ident, $inner:ident, $kind:ident) => {
        impl<B: $crate::Backend> $name<B> {
            #[inline(always)]
            pub fn id(&self) -> $crate::id_gen::ResourceId {
                self.0.id
            }

            /// The backend object.
            #[inline(always)]
            pub fn internal(&self) -> &<B as $crate::Backend>::$kind {
                &self.0.raw
            }
        }

        impl<B: $crate::Backend> Clone for $name<B> {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl<B: $crate::Backend> PartialEq for $name<B> {
            fn eq(&self, other: &Self) -> bool {
                self.0.id == other.0.id
            }
        }

        impl<B: $crate::Backend> Eq for $name<B> {}

        impl<B: $crate::Backend> std::hash::Hash for $name<B> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.0.id.hash(state);
            }
        }

        impl<B: $crate::Backend> std::fmt::Debug for $name<B> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.0.id)
                    .finish()
            }
        }

        impl<B: $crate::Backend> Drop for $inner<B> {
            fn drop(&mut self) {
                // SAFETY: `raw` is never touched again after this.
                let raw = unsafe { std::mem::ManuallyDrop::take(&mut self.raw) };
                // The context is gone if this fails, so there is nobody left to destroy it.
                let _ = self
                    .on_drop
                    .send($crate::garbage::Garbage::$kind { id: self.id, raw });
            }
        }
    };
}

pub(crate) use gpu_handle;
