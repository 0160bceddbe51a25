//! Configuration section definitions.
//!
//! Each module corresponds to a section in `livedoc.toml`:
//!
//! | Module     | TOML Section   | Purpose                              |
//! |------------|----------------|--------------------------------------|
//! | `document` | `[document]`   | Backing JSON file                    |
//! | `serve`    | `[serve]`      | HTTP and WebSocket listeners         |
//! | `watch`    | `[watch]`      | External-change debounce             |

mod document;
mod serve;
mod watch;

pub use document::DocumentConfig;
pub use serve::ServeConfig;
pub use watch::WatchConfig;
