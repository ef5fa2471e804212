//! Middleware chain for HTTP client.

use crate::{Response, Result};
use async_trait::async_trait;
use reqwest::Request;
use std::sync::Arc;

/// Middleware trait for processing requests and responses.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and call the next middleware.
    async fn handle(&self, request: Request, next: &MiddlewareChain) -> Result<Response>;
}

/// Chain of middleware handlers ending in the transport.
///
/// Cloning is cheap. A clone taken inside [`Middleware::handle`] keeps its
/// position, so it can be moved into a spawned task and used to send a
/// follow-up request through the rest of the chain.
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    client: reqwest::Client,
    index: usize,
}

impl MiddlewareChain {
    /// Create an empty chain over `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            middlewares: Arc::from(Vec::new()),
            client,
            index: 0,
        }
    }

    /// Append a middleware. Earlier middlewares see the request first.
    pub fn with_middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Append a middleware that is also held elsewhere.
    pub fn with_shared(self, middleware: Arc<dyn Middleware>) -> Self {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(middleware);
        Self {
            middlewares: middlewares.into(),
            client: self.client,
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute the request through the whole chain.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.execute_at(0, request).await
    }

    async fn execute_at(&self, index: usize, request: Request) -> Result<Response> {
        match self.middlewares.get(index) {
            Some(middleware) => {
                let next = MiddlewareChain {
                    middlewares: self.middlewares.clone(),
                    client: self.client.clone(),
                    index: index + 1,
                };
                middleware.handle(request, &next).await
            }
            None => {
                let response = self.client.execute(request).await?;
                Response::from_reqwest(response).await
            }
        }
    }

    /// Continue to the next middleware.
    pub async fn next(&self, request: Request) -> Result<Response> {
        self.execute_at(self.index, request).await
    }
}
