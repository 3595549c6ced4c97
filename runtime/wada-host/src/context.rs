/// Capabilities the runtime consumes from the HTTP layer that owns the
/// external request/response pair.
///
/// The transport stays entirely behind this trait: the runtime only ever
/// mutates headers, appends body bytes, and takes the finalized response
/// handle once the guest commits. Nothing here blocks. Writes are accepted
/// unconditionally, so a slow external consumer means unbounded buffering
/// in the implementation; this layer exposes no backpressure to the guest.
pub trait ResponseContext: Send + 'static {
    /// Handle to the finalized response, observable by the external caller
    /// while body bytes may still be streaming into the sink.
    type Response: Send + 'static;

    /// Set or append one header value. With `append` false, all existing
    /// values for `name` are replaced by `value`; with `append` true,
    /// `value` joins the existing list in call order.
    fn header(&mut self, name: &str, value: &str, append: bool);

    /// Append bytes to the response body sink, in call order.
    fn body_write(&mut self, chunk: &[u8]);

    /// Mark the body sink complete; no more bytes will arrive.
    fn body_close(&mut self);

    /// The finalized response handle. Called exactly once per connection,
    /// at the moment the guest commits (first body byte or close).
    fn response(&mut self) -> Self::Response;
}
