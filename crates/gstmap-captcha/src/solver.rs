//! The solver seam consumed by the portal driver.

use crate::error::Result;
use async_trait::async_trait;

/// Captcha solver trait for pluggable implementations.
///
/// Implementations are stateless from the caller's perspective; rate
/// limiting is the remote service's concern.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Attempt to solve a challenge image, returning the solution text.
    async fn solve(&self, image: &[u8]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptchaError;

    struct FixedSolver(&'static str);

    #[async_trait]
    impl CaptchaSolver for FixedSolver {
        async fn solve(&self, _image: &[u8]) -> Result<String> {
            if self.0.is_empty() {
                Err(CaptchaError::SolveFailure("empty".to_string()))
            } else {
                Ok(self.0.to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_solver_object_safety() {
        let solver: Box<dyn CaptchaSolver> = Box::new(FixedSolver("123456"));
        let solution = solver.solve(&[0u8; 16]).await.expect("solve");
        assert_eq!(solution, "123456");
    }
}
