// handlers/mod.rs - Route handlers
//
// Access tiers are applied in routes.rs, not here:
// Public (signup, login, password reset) → Protected (valid JWT) → Admin (role guard)
//
// crud.rs holds the generic handlers; each resource gets its own
// instantiation, e.g. `crud::get_many::<Sample>`.

pub mod auth;   // /users/signup, /login, /forgotPassword, /resetPassword, /updatePassword
pub mod crud;   // Generic create/read/update/delete for any Resource
pub mod system; // /, /health, fallback
pub mod users;  // /users/me, /updateMe, /deleteMe

pub use auth::{forgot_password, login, reset_password, signup, update_password};
pub use users::{delete_me, get_me, update_me};
