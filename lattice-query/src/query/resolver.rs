//! Resolvers
//!
//! A resolver is the caller-supplied async operation that produces a payload
//! for a key, typically by performing an HTTP request. The coordinator treats
//! it as opaque: it only ever calls it and awaits the returned future.

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};

use super::key::RequestKey;

/// An async operation producing a `T` (or failing with an `E`) for a key.
///
/// Any `Fn(RequestKey) -> impl Future<Output = Result<T, E>>` is a resolver,
/// so most callers pass a closure:
///
/// ```rust,ignore
/// let fetch = |key: RequestKey| async move { client.pokemon(key.as_str()).await };
/// coordinator.request("pikachu", &fetch);
/// ```
///
/// The returned future is spawned on the coordinator's runtime, hence the
/// `'static` bound: capture what it needs by value.
pub trait Resolver<T, E>: Send + Sync {
    fn resolve(&self, key: &RequestKey) -> BoxFuture<'static, Result<T, E>>;
}

impl<T, E, F, Fut> Resolver<T, E> for F
where
    F: Fn(RequestKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn resolve(&self, key: &RequestKey) -> BoxFuture<'static, Result<T, E>> {
        self(key.clone()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u32);

    impl Resolver<u32, String> for Fixed {
        fn resolve(&self, _key: &RequestKey) -> BoxFuture<'static, Result<u32, String>> {
            let value = self.0;
            async move { Ok(value) }.boxed()
        }
    }

    #[tokio::test]
    async fn closures_are_resolvers() {
        let resolver = |key: RequestKey| async move {
            if key.as_str() == "pikachu" {
                Ok(25)
            } else {
                Err(format!("no pokemon named {key}"))
            }
        };

        assert_eq!(resolver.resolve(&RequestKey::new("pikachu")).await, Ok(25));
        assert_eq!(
            resolver.resolve(&RequestKey::new("missingno")).await,
            Err("no pokemon named missingno".to_string())
        );
    }

    #[tokio::test]
    async fn custom_resolver_types() {
        let resolver = Fixed(151);
        assert_eq!(resolver.resolve(&RequestKey::new("mew")).await, Ok(151));
    }
}
