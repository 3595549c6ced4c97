use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::context::ResponseContext;

/// One in-flight bridged request.
///
/// The completion sender doubles as the committed flag: it is taken on the
/// first body write (or on close), so a second settle attempt is
/// structurally impossible.
pub(crate) struct Connection<C: ResponseContext> {
    ctx: C,
    completion: Option<oneshot::Sender<C::Response>>,
}

impl<C: ResponseContext> Connection<C> {
    pub(crate) fn new(ctx: C, completion: oneshot::Sender<C::Response>) -> Self {
        Self {
            ctx,
            completion: Some(completion),
        }
    }

    /// Fire the one-shot completion if it has not fired yet.
    ///
    /// A send to a receiver the external caller already dropped is ignored;
    /// the connection keeps accepting writes regardless.
    pub(crate) fn commit(&mut self) {
        if let Some(tx) = self.completion.take() {
            let response = self.ctx.response();
            if tx.send(response).is_err() {
                tracing::debug!("completion receiver dropped before commit");
            }
        }
    }

    pub(crate) fn committed(&self) -> bool {
        self.completion.is_none()
    }

    pub(crate) fn ctx_mut(&mut self) -> &mut C {
        &mut self.ctx
    }
}

/// Table of currently-open connections, keyed by id.
///
/// Ids come from a strictly increasing counter scoped to one runtime
/// instance; an id is never reused while its connection is open. Entries
/// are fully independent of each other.
pub(crate) struct ConnectionTable<C: ResponseContext> {
    next_id: u32,
    entries: HashMap<u32, Connection<C>>,
}

impl<C: ResponseContext> ConnectionTable<C> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn open(&mut self, conn: Connection<C>) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.entries.insert(id, conn);
        id
    }

    pub(crate) fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut Connection<C>> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: u32) -> Option<Connection<C>> {
        self.entries.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullContext;

    impl ResponseContext for NullContext {
        type Response = ();

        fn header(&mut self, _name: &str, _value: &str, _append: bool) {}
        fn body_write(&mut self, _chunk: &[u8]) {}
        fn body_close(&mut self) {}
        fn response(&mut self) {}
    }

    fn open_one(table: &mut ConnectionTable<NullContext>) -> u32 {
        let (tx, _rx) = oneshot::channel();
        table.open(Connection::new(NullContext, tx))
    }

    #[test]
    fn ids_increase_and_never_collide_while_open() {
        let mut table = ConnectionTable::new();
        let first = open_one(&mut table);
        let second = open_one(&mut table);
        assert!(second > first);
        assert!(table.contains(first));
        assert!(table.contains(second));
    }

    #[test]
    fn remove_makes_id_unknown() {
        let mut table = ConnectionTable::new();
        let id = open_one(&mut table);
        assert!(table.remove(id).is_some());
        assert!(!table.contains(id));
        assert!(table.remove(id).is_none());
    }

    #[test]
    fn ids_are_not_reused_after_close() {
        let mut table = ConnectionTable::new();
        let first = open_one(&mut table);
        table.remove(first);
        let second = open_one(&mut table);
        assert_ne!(first, second);
    }

    #[test]
    fn commit_fires_once() {
        let (tx, mut rx) = oneshot::channel();
        let mut conn = Connection::new(NullContext, tx);
        assert!(!conn.committed());
        conn.commit();
        assert!(conn.committed());
        conn.commit();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn commit_with_dropped_receiver_is_ignored() {
        let (tx, rx) = oneshot::channel();
        let mut conn = Connection::new(NullContext, tx);
        drop(rx);
        conn.commit();
        assert!(conn.committed());
    }
}
