use crate::server::response::ApiError;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_PATH_LEN: usize = 255;

fn is_valid_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == ':'
}

pub fn validate_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("Domain cannot be empty".to_string());
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(format!("Domain cannot exceed {MAX_DOMAIN_LEN} characters"));
    }
    if !domain.chars().all(is_valid_domain_char) {
        return Err(
            "Domain can only contain alphanumeric characters, hyphens, periods, and a port"
                .to_string(),
        );
    }
    if domain.starts_with('.') || domain.starts_with('-') {
        return Err("Domain cannot start with a period or hyphen".to_string());
    }
    Ok(())
}

pub fn validate_site_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err("Site path must start with '/'".to_string());
    }
    if path.len() > MAX_PATH_LEN {
        return Err(format!("Site path cannot exceed {MAX_PATH_LEN} characters"));
    }
    if path.contains("..") || path.contains("//") {
        return Err("Site path cannot contain '..' or '//'".to_string());
    }
    Ok(())
}

pub fn validate_site(domain: &str, path: &str) -> Result<(), ApiError> {
    validate_domain(domain).map_err(ApiError::bad_request)?;
    validate_site_path(path).map_err(ApiError::bad_request)
}
