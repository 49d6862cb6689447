//! Reverse proxy configuration shipped with the compose files

use std::path::Path;

fn read(relative: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(relative);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn directives<'a>(config: &'a str, name: &str) -> Vec<&'a str> {
    config
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| line.split_whitespace().next() == Some(name))
        .collect()
}

#[test]
fn test_https_port_terminates_tls() {
    let config = read("nginx/default.conf");
    let https: Vec<_> = directives(&config, "listen").into_iter().filter(|l| l.contains("443")).collect();
    assert!(!https.is_empty(), "nginx must listen on 443");
    for listen in https {
        assert!(listen.split_whitespace().any(|w| w.trim_end_matches(';') == "ssl"), "plain HTTP on 443: {}", listen);
    }

    let certificate = directives(&config, "ssl_certificate");
    let key = directives(&config, "ssl_certificate_key");
    assert_eq!(certificate, vec!["ssl_certificate /etc/nginx/certs/server.crt;"]);
    assert_eq!(key, vec!["ssl_certificate_key /etc/nginx/certs/server.key;"]);
}

#[test]
fn test_compose_mounts_certificates() {
    for file in ["docker-compose-dev.yml", "docker-compose-prod.yml"] {
        let compose = read(file);
        assert!(compose.contains("\"8445:443\""), "{} must publish 8445", file);
        assert!(compose.contains("./nginx/certs:/etc/nginx/certs:ro"), "{} must mount the certificates", file);
    }
}
