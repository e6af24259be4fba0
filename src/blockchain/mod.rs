pub mod bridge;
pub mod ethereum;
pub mod mock;
pub mod router_api;
pub mod traits;
pub mod types;

pub use bridge::EthersBridge;
pub use ethereum::EthereumClient;
pub use router_api::RouterApiClient;
pub use traits::{Bridge, ChainClient, Router};
pub use types::{CanonicalTx, IndexedTransaction, Route, TxReceiptInfo, UnsignedTransfer};
