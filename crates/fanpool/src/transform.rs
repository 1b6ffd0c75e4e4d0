/// The per-job function a [`WorkerPool`](crate::WorkerPool) applies.
///
/// The pool treats the transform as opaque. It is shared by every worker, so
/// it must be `Send + Sync`; any per-call state belongs in the payload.
///
/// Async closures returning `Result` implement this trait through the blanket
/// impl:
///
/// ```
/// use fanpool::Transform;
///
/// fn assert_transform<T: Transform<u32>>(_: &T) {}
///
/// let double = |n: u32| async move { n.checked_mul(2).ok_or("overflow") };
/// assert_transform(&double);
/// ```
pub trait Transform<T>: Send + Sync + 'static {
    /// Value produced for a successful job.
    type Output: Send + 'static;
    /// Error produced for a failed job.
    type Error: Send + 'static;

    /// Runs the transform for one payload.
    fn apply(&self, payload: T) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

impl<T, F, Fut, O, E> Transform<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send,
    O: Send + 'static,
    E: Send + 'static,
{
    type Output = O;
    type Error = E;

    fn apply(&self, payload: T) -> impl Future<Output = Result<O, E>> + Send {
        self(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Parse;

    impl Transform<String> for Parse {
        type Output = i64;
        type Error = core::num::ParseIntError;

        async fn apply(&self, payload: String) -> Result<i64, Self::Error> {
            payload.trim().parse()
        }
    }

    #[tokio::test]
    async fn closures_and_types_are_transforms() {
        let square = |n: i64| async move { Ok::<_, ()>(n * n) };
        assert_eq!(square.apply(7).await, Ok(49));

        assert_eq!(Parse.apply(" 12 ".to_string()).await, Ok(12));
        assert!(Parse.apply("twelve".to_string()).await.is_err());
    }
}
