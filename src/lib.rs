#[macro_use]
extern crate log;

/**
* `floodgate` is a library for dispatching HTTP requests with a hard cap
* on how many run at once. Submissions beyond the cap wait in a FIFO
* backlog and are admitted as running requests finish; every submission
* ends in exactly one callback, whether it succeeded, failed, or was
* cancelled while queued or in flight.
*
* The main struct of this crate is `ServiceBuilder` which can be used to
* configure and run your own dispatcher.
*
* "Hello world" example:
* ```no_run
* use floodgate::ServiceBuilder;
*
* #[tokio::main]
* async fn main() -> Result<(), Box<dyn std::error::Error>> {
*     let service = ServiceBuilder::default().max_concurrent(2usize).build()?;
*     service.get("https://example.com", |outcome| match outcome {
*         Ok(body) => println!("got {} bytes", body.len()),
*         Err(e) => eprintln!("request failed: {}", e),
*     });
*     Ok(())
* }
* ```
*/
mod dispatcher;
mod service;
mod transport;
mod types;
mod uri;

pub mod test_utils;

pub use dispatcher::Dispatcher;
pub use service::{Service, ServiceBuilder};
pub use transport::{Exchange, RawResponse, ReqwestTransport, Transport};
pub use types::*;
