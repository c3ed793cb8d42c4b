pub mod extract_dto;
pub mod health_dto;
