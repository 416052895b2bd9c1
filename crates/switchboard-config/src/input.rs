//! Template values used by activity configuration.
//!
//! Every string that ends up in the response document or drives control flow
//! is a minijinja template rendered when the activity executes. The render
//! context exposes:
//!
//! - `args`: arguments supplied when the call started (`arg_` form keys)
//! - `vars`: results stored by earlier activities under their `result` name
//! - `call`: the call context captured by the enclosing call scope
//! - `queue`: queue status while an enqueue wait body is running
//!
//! ```json
//! {
//!   "text": "You are caller number {{ queue.position }}",
//!   "number": "{{ args.Agent }}",
//!   "static_value": "+15550100"
//! }
//! ```

/// An input value is a template string that gets resolved at runtime.
pub type InputValue = String;
