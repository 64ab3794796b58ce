//! Utility macros for reducing boilerplate

/// Implement `FromRef<AppState>` for a field so handlers can extract it
/// directly.
///
/// # Example
/// ```ignore
/// impl_from_ref!(JobQueue, queue);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for JobQueue {
///     fn from_ref(state: &AppState) -> Self {
///         state.queue.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
