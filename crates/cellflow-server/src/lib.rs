pub mod csrf;
mod routes;
pub mod store;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

use anyhow::Result;
use tokio::net::TcpListener;

use store::Store;

pub async fn serve(listener: TcpListener, store: Store) -> Result<()> {
    let app = routes::build_router(store);
    axum::serve(listener, app).await?;
    Ok(())
}
