//! Background hooks fed from synchronous code through bounded channels.

mod debounce;

pub use debounce::{
  AsyncHook,
  DEFAULT_CAPACITY,
  send_blocking,
  try_send,
};
