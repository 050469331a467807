//! Validation response rewriting — substitute the authenticated username
//!
//! CAS answers a validation request with either the legacy v1 plain-text
//! format (`yes\n<user>\n`) or the v2/v3 XML format
//! (`<cas:user>user</cas:user>` inside a service response envelope). Both
//! rewrites are single-pass on the first pattern occurrence only.

/// CAS validation response variant, selected by the validation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasProtocol {
    /// Legacy `/validate` plain-text format: `yes\n<user>`
    V1,
    /// XML format used by `/serviceValidate` and `/proxyValidate`
    Xml,
}

impl CasProtocol {
    /// Select the variant for a validation path (`/validate` is legacy)
    pub fn for_path(path: &str) -> Self {
        if path == "/validate" {
            CasProtocol::V1
        } else {
            CasProtocol::Xml
        }
    }
}

/// Extract the authenticated username from a validation response body.
///
/// Returns `None` when the body carries no success pattern (failed
/// validation, unexpected format), in which case impersonation cannot
/// proceed — there is no real identity to replace.
pub fn extract_user(protocol: CasProtocol, body: &str) -> Option<&str> {
    match protocol {
        CasProtocol::V1 => {
            let start = body.find("yes\n")? + "yes\n".len();
            let rest = &body[start..];
            let end = rest.find('\n').unwrap_or(rest.len());
            Some(&rest[..end])
        }
        CasProtocol::Xml => {
            let start = body.find("<cas:user>")? + "<cas:user>".len();
            let rest = &body[start..];
            let end = rest.find("</cas:user>")?;
            Some(&rest[..end])
        }
    }
}

/// Replace the first username occurrence with the impersonation target,
/// keeping the surrounding structural template intact.
///
/// Returns `None` when the body carries no success pattern; the caller then
/// passes the upstream body through unmodified.
pub fn rewrite(protocol: CasProtocol, body: &str, target: &str) -> Option<String> {
    match protocol {
        CasProtocol::V1 => {
            let start = body.find("yes\n")? + "yes\n".len();
            let rest = &body[start..];
            let end = rest.find('\n').unwrap_or(rest.len());
            let mut out = String::with_capacity(body.len() + target.len());
            out.push_str(&body[..start]);
            out.push_str(target);
            out.push_str(&rest[end..]);
            Some(out)
        }
        CasProtocol::Xml => {
            let open = body.find("<cas:user>")?;
            let start = open + "<cas:user>".len();
            let end = start + body[start..].find("</cas:user>")?;
            let mut out = String::with_capacity(body.len() + target.len());
            out.push_str(&body[..start]);
            out.push_str(target);
            out.push_str(&body[end..]);
            Some(out)
        }
    }
}
