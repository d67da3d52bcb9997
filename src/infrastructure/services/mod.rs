//! Infrastructure services

mod subject_service;

pub use subject_service::{
    ClaimsSubjectDirectory, SubjectCacheConfig, SubjectService,
};
