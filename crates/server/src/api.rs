pub mod handlers;
mod middleware;
mod router;

pub use router::create_router;
