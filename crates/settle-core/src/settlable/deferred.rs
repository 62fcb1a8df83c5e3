use super::Settlable;
use super::handles::{RejectHandle, ResolveHandle};
use crate::ports::SchedulerRef;

/// Deferred は pending な settlable と、その entry point の組
///
/// executor の外から settle したい呼び出し側向け。
pub struct Deferred<T, E> {
    pub settlable: Settlable<T, E>,
    pub resolve: ResolveHandle<T, E>,
    pub reject: RejectHandle<T, E>,
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    pub fn new(scheduler: &SchedulerRef) -> Self {
        let settlable = Settlable::pending(scheduler);
        Self {
            resolve: ResolveHandle::new(settlable.clone()),
            reject: RejectHandle::new(settlable.clone()),
            settlable,
        }
    }
}
