pub mod tokio_mpsc;
