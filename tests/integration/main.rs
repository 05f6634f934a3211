//! Integration tests for vfstore, driven through the public API.

mod buckets;
mod concurrency;
mod files;
mod persistence;
mod properties;
mod serving;
mod support;
