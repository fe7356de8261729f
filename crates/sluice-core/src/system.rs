//! Platform description reported by `SYST`

use sysinfo::System;

/// Human readable platform string, e.g. `Linux 6.1.0-18-amd64 x86_64`
pub fn platform_string() -> String {
    native_platform().unwrap_or_else(|| match std::env::consts::OS {
        "windows" => format!("Windows {}", std::env::consts::ARCH),
        "" => "Unknown".to_string(),
        os => os.to_string(),
    })
}

fn native_platform() -> Option<String> {
    let release = System::kernel_version()?;
    let machine = std::env::consts::ARCH;
    Some(match std::env::consts::OS {
        "linux" => format!("Linux {} {}", release, machine),
        "macos" => format!("macOS {}", release),
        _ => {
            let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
            format!("{} {} {}", name, release, machine)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_string_is_single_line() {
        let s = platform_string();
        assert!(!s.is_empty());
        assert!(!s.contains('\r') && !s.contains('\n'));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_prefix() {
        assert!(platform_string().starts_with("Linux "));
    }
}
