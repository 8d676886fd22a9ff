//! Identity of the caller. Sign-up and sign-in are handled by the hosted
//! auth backend; this side only verifies the bearer tokens it issues.

mod claims;
pub(crate) mod extractors;

pub use claims::Claims;
pub use extractors::{AuthUser, MaybeUser};
