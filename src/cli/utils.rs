use simple_error::{SimpleResult, bail};

/// Check a required input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_required_filename(filename: &str, label: &str) -> SimpleResult<()> {
    if filename.is_empty() {
        bail!("Must specify {label} file");
    }
    let path = std::path::Path::new(&filename);
    if !path.exists() {
        bail!("Can't find specified {label} file: '{filename}'");
    }
    if !path.is_file() {
        bail!("Specified {label} file path does not appear to be a file: '{filename}'");
    }
    Ok(())
}

/// Check an optional input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_optional_filename(filename_opt: Option<&String>, label: &str) -> SimpleResult<()> {
    if let Some(filename) = filename_opt {
        let path = std::path::Path::new(&filename);
        if !path.exists() {
            bail!("Can't find specified {label} file: '{filename}'");
        }
        if !path.is_file() {
            bail!("Specified {label} file path does not appear to be a file: '{filename}'");
        }
    }
    Ok(())
}

/// Split an extra-arguments option string into an argument vector
///
/// Simple whitespace splitting is intentional here: these strings carry tool tuning flags,
/// not arbitrary shell syntax.
///
pub fn split_extra_args(args_option: Option<&String>) -> Vec<String> {
    match args_option {
        Some(args) => args.split_whitespace().map(|x| x.to_string()).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extra_args() {
        assert!(split_extra_args(None).is_empty());
        let args = "genomeSize=60k  -fast".to_string();
        assert_eq!(split_extra_args(Some(&args)), vec!["genomeSize=60k", "-fast"]);
    }
}
