//! Progress indicators for the confseed CLI.

use indicatif::{ProgressBar, ProgressStyle};
use provision::{KeySource, ProviderError};
use std::time::Duration;

/// Start a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Key source that shows a spinner while the generator is contacted
pub struct SpinnerKeySource<S> {
    inner: S,
    quiet: bool,
}

impl<S: KeySource> SpinnerKeySource<S> {
    pub fn new(inner: S, quiet: bool) -> Self {
        Self { inner, quiet }
    }
}

impl<S: KeySource> KeySource for SpinnerKeySource<S> {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    fn fetch(&self) -> Result<String, ProviderError> {
        if self.quiet {
            return self.inner.fetch();
        }

        let pb = spinner(&format!("Generating keys via {}", self.inner.endpoint()));
        let result = self.inner.fetch();
        pb.finish_and_clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision::StaticKeySource;

    #[test]
    fn test_spinner_source_delegates() {
        let inner = StaticKeySource::new("define('AUTH_KEY', 'a');");
        let source = SpinnerKeySource::new(inner.clone(), true);

        assert_eq!(source.endpoint(), "static");
        assert_eq!(source.fetch().unwrap(), "define('AUTH_KEY', 'a');");
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn test_spinner_source_passes_errors() {
        let source = SpinnerKeySource::new(StaticKeySource::unavailable(), false);
        assert!(matches!(
            source.fetch(),
            Err(ProviderError::Unavailable { .. })
        ));
    }
}
