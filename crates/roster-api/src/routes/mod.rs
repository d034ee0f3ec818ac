//! # API Route Modules
//!
//! | Prefix  | Module        | Domain           |
//! |---------|---------------|------------------|
//! | `/api/*` | [`profiles`] | Student profiles |

pub mod profiles;
