use uuid::Uuid;

/// Mint an opaque connection id for a newly accepted socket.
///
/// Connection ids are never reused and carry no structure; callers treat
/// them as opaque strings.
pub fn connection_id() -> String {
    Uuid::new_v4().to_string()
}
