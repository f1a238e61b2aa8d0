pub(crate) mod retrier_logging;
pub(crate) mod test_support;
