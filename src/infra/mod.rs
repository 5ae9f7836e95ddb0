mod drainage;
mod network;
mod transformers;

pub use drainage::{plan_drainage, wwtp_point, DrainageArrow};
pub use network::{plan_network, steiner_candidates, CableNetwork};
pub use transformers::{plan_transformers, Transformer, TransformerCosts, TransformerPlan};
