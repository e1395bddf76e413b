//! Promo Admin Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = promo_admin_backend::run().await {
        // Logging may not be initialized yet when configuration fails
        tracing::error!(error = %e, "server stopped");
        eprintln!("promo-admin-backend: {}", e);
        std::process::exit(1);
    }
}
