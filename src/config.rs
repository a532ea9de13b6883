/// Config for a container
/// ## Fields
/// - `allow_override`:
///   If `true`, any registration may replace an earlier one with the same key.
///   Otherwise only modules or bindings marked as overriding may do so.
///
/// - `context_fallback`:
///   If `true`, a request on a non-root context with no binding for that context
///   is retried on the root context, and the binding found there is produced on the root context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub allow_override: bool,
    pub context_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_override: false,
            context_fallback: true,
        }
    }
}
