//! Rules for the appliance network settings.

use super::rules::{port_in_range, PORT_RANGE_RESOLUTION};
use super::Notification;
use models::{DnsServerConfiguration, FirewallRule, ProxyConfiguration};
use std::net::IpAddr;
use url::Url;

fn is_ip(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// Every whitespace-separated address in a rule must be an IP address.
pub fn validate_firewall(rules: &[FirewallRule]) -> Vec<Notification> {
    let mut notifications = Vec::new();
    for rule in rules {
        let address = match &rule.address {
            Some(address) => address,
            None => continue,
        };
        for token in address.split_whitespace().filter(|t| !is_ip(t)) {
            notifications.push(Notification::error(
                "firewall.address.invalid",
                format!("Firewall address '{}' is not an IP address", token),
                "Provide IPv4 or IPv6 addresses",
            ));
        }
    }
    notifications
}

// Accepts a URL with a host, or a bare "host[:port]".
fn is_proxy_server(server: &str) -> bool {
    if let Ok(url) = Url::parse(server) {
        if url.host().is_some() {
            return true;
        }
    }
    Url::parse(&format!("http://{}", server))
        .map(|url| url.host().is_some())
        .unwrap_or(false)
}

pub fn validate_proxy(proxies: &[ProxyConfiguration]) -> Vec<Notification> {
    let mut notifications = Vec::new();
    for proxy in proxies {
        match proxy.port {
            None => notifications.push(Notification::error(
                "proxy.port.invalid",
                "Port is null",
                PORT_RANGE_RESOLUTION,
            )),
            Some(port) if !port_in_range(port) => notifications.push(Notification::error(
                "proxy.port.invalid",
                format!("Proxy port {} is out of range", port),
                PORT_RANGE_RESOLUTION,
            )),
            Some(_) => {}
        }

        if let Some(server) = proxy.server.as_deref().filter(|s| !s.is_empty()) {
            if !is_proxy_server(server) {
                notifications.push(Notification::error(
                    "proxy.server.invalid",
                    format!("Proxy server '{}' is not a valid URL", server),
                    "Provide a host name, IP address, or URL for the proxy server",
                ));
            }
        }
    }
    notifications
}

/// Servers may be written with surrounding brackets, as IPv6 addresses often are.
pub fn validate_dns(dns: &DnsServerConfiguration) -> Vec<Notification> {
    let servers = match &dns.servers {
        Some(servers) => servers,
        None => return Vec::new(),
    };
    servers
        .iter()
        .filter(|server| {
            let server = server.as_str();
            let bare = server.strip_prefix('[').unwrap_or(server);
            let bare = bare.strip_suffix(']').unwrap_or(bare);
            !is_ip(bare)
        })
        .map(|server| {
            Notification::error(
                "dns.server.invalid",
                format!("DNS server '{}' is not an IP address", server),
                "Provide IPv4 or IPv6 addresses",
            )
        })
        .collect()
}
