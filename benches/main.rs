#![allow(
    missing_docs,
    clippy::missing_docs_in_private_items,
    unused_results,
    clippy::unwrap_used
)]


use criterion::Criterion;
use tracing_subscriber::filter::EnvFilter;

fn main() {
    // Events are only emitted when the library is built with the `tracing` feature.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    blog::blog();

    Criterion::default().configure_from_args().final_summary();
}
