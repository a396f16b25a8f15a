pub mod request_validation_service;
