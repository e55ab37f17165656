//! Cross-module tests: index properties, lifecycle scenarios and ranking.

mod support;
