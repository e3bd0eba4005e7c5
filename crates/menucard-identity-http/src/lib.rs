//! [`IdentityProvider`](menucard_core::identity::IdentityProvider) backed by a
//! hosted auth service's admin REST API.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/users?email=<email>` | `{"users": [...]}`; exact match chosen client-side |
//! | `POST` | `/admin/users` | Body: `{"email": "...", "email_confirm": true}`; `409`/`422` = already exists |

mod client;
pub mod error;

pub use client::{HttpIdentity, HttpIdentityConfig};
pub use error::{Error, Result};
