//! `docker run` command-string parsing
//!
//! The run endpoint accepts the familiar CLI form ("docker run -d -p 8080:80
//! --name my-nginx nginx") and turns it into typed create/start parameters.
//! Only the common flags are supported; anything unknown is rejected rather
//! than silently dropped.

use std::collections::HashMap;

use bollard::container::{Config, CreateContainerOptions};
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};

use crate::error::{Error, Result};

/// One `-p` publish specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Container-side port
    pub container_port: u16,
    /// Host-side port; `None` lets the daemon pick one
    pub host_port: Option<u16>,
    /// Optional host interface binding
    pub host_ip: Option<String>,
}

/// Parsed `docker run` request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub image: String,
    pub command: Vec<String>,
    pub detach: bool,
    /// Whether detach was forced on because the caller omitted `-d`
    /// (attached runs would block the request indefinitely).
    pub detach_forced: bool,
    pub name: Option<String>,
    pub ports: Vec<PortMapping>,
    /// Raw bind specs, `/host:/container[:mode]`
    pub volumes: Vec<String>,
    pub env: Vec<String>,
    pub restart: Option<String>,
    pub network: Option<String>,
    pub interactive: bool,
    pub tty: bool,
    pub auto_remove: bool,
    pub privileged: bool,
}

/// Parse a `docker run ...` command string.
pub fn parse_run_command(command: &str) -> Result<RunRequest> {
    let tokens = split_command(command)?;
    if tokens.is_empty() {
        return Err(Error::InvalidCommand("empty command".to_string()));
    }

    // Strip the "docker run" / "run" prefix when present.
    let mut idx = 0;
    if tokens[0] == "docker" {
        if tokens.get(1).map(String::as_str) == Some("run") {
            idx = 2;
        } else {
            return Err(Error::InvalidCommand(
                "expected a 'docker run' command".to_string(),
            ));
        }
    } else if tokens[0] == "run" {
        idx = 1;
    }

    let mut request = RunRequest::default();
    let args = &tokens[idx..];
    let mut i = 0;

    let mut take_value = |i: &mut usize, flag: &str, inline: Option<&str>| -> Result<String> {
        if let Some(value) = inline {
            return Ok(value.to_string());
        }
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| Error::InvalidCommand(format!("flag {flag} expects a value")))
    };

    while i < args.len() {
        let arg = args[i].as_str();
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with('-') => (flag, Some(value)),
            _ => (arg, None),
        };

        match flag {
            "-d" | "--detach" => request.detach = true,
            "-i" | "--interactive" => request.interactive = true,
            "-t" | "--tty" => request.tty = true,
            "--rm" => request.auto_remove = true,
            "--privileged" => request.privileged = true,
            "--name" => request.name = Some(take_value(&mut i, flag, inline)?),
            "--restart" => request.restart = Some(take_value(&mut i, flag, inline)?),
            "--network" => request.network = Some(take_value(&mut i, flag, inline)?),
            "-p" | "--publish" => {
                let spec = take_value(&mut i, flag, inline)?;
                request.ports.push(parse_port_spec(&spec)?);
            }
            "-v" | "--volume" => request.volumes.push(take_value(&mut i, flag, inline)?),
            "-e" | "--env" => {
                let spec = take_value(&mut i, flag, inline)?;
                // "-e KEY" host pass-through is not supported here.
                if spec.contains('=') {
                    request.env.push(spec);
                }
            }
            _ if flag.starts_with('-') => {
                return Err(Error::InvalidCommand(format!("unsupported flag: {flag}")));
            }
            _ => {
                request.image = args[i].clone();
                request.command = args[i + 1..].to_vec();
                break;
            }
        }
        i += 1;
    }

    if request.image.is_empty() {
        return Err(Error::InvalidCommand("image name is required".to_string()));
    }

    // Attached runs would block the HTTP request until the container exits.
    if !request.detach {
        request.detach = true;
        request.detach_forced = true;
    }

    Ok(request)
}

fn parse_port_spec(spec: &str) -> Result<PortMapping> {
    let parts: Vec<&str> = spec.split(':').collect();
    let parse_port = |s: &str| {
        s.parse::<u16>()
            .map_err(|_| Error::InvalidCommand(format!("invalid port: {s}")))
    };
    match parts.as_slice() {
        [container] => Ok(PortMapping {
            container_port: parse_port(container)?,
            host_port: None,
            host_ip: None,
        }),
        [host, container] => Ok(PortMapping {
            container_port: parse_port(container)?,
            host_port: Some(parse_port(host)?),
            host_ip: None,
        }),
        [ip, host, container] => Ok(PortMapping {
            container_port: parse_port(container)?,
            host_port: Some(parse_port(host)?),
            host_ip: Some((*ip).to_string()),
        }),
        _ => Err(Error::InvalidCommand(format!(
            "invalid publish spec: {spec}"
        ))),
    }
}

/// Split a command line into tokens, honoring single/double quotes.
fn split_command(command: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(Error::InvalidCommand("unterminated quote".to_string()));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

impl RunRequest {
    /// Lower to bollard create-container parameters.
    #[must_use]
    pub fn to_container_config(
        &self,
    ) -> (Option<CreateContainerOptions<String>>, Config<String>) {
        let options = self.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for mapping in &self.ports {
            let key = format!("{}/tcp", mapping.container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: mapping.host_ip.clone(),
                    host_port: mapping.host_port.map(|p| p.to_string()),
                }]),
            );
        }

        let restart_policy = self.restart.as_deref().map(|name| RestartPolicy {
            name: Some(match name {
                "no" => RestartPolicyNameEnum::NO,
                "always" => RestartPolicyNameEnum::ALWAYS,
                "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
                "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
                _ => RestartPolicyNameEnum::EMPTY,
            }),
            maximum_retry_count: None,
        });

        let host_config = HostConfig {
            binds: (!self.volumes.is_empty()).then(|| self.volumes.clone()),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            network_mode: self.network.clone(),
            restart_policy,
            auto_remove: self.auto_remove.then_some(true),
            privileged: self.privileged.then_some(true),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.image.clone()),
            cmd: (!self.command.is_empty()).then(|| self.command.clone()),
            env: (!self.env.is_empty()).then(|| self.env.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            open_stdin: self.interactive.then_some(true),
            tty: self.tty.then_some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        (options, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command() {
        let request = parse_run_command(
            "docker run -d -p 8080:80 -v /srv/www:/usr/share/nginx/html:ro \
             -e TZ=UTC --restart unless-stopped --name my-nginx nginx:alpine",
        )
        .unwrap();

        assert_eq!(request.image, "nginx:alpine");
        assert!(request.detach);
        assert!(!request.detach_forced);
        assert_eq!(request.name.as_deref(), Some("my-nginx"));
        assert_eq!(
            request.ports,
            vec![PortMapping {
                container_port: 80,
                host_port: Some(8080),
                host_ip: None,
            }]
        );
        assert_eq!(request.volumes, vec!["/srv/www:/usr/share/nginx/html:ro"]);
        assert_eq!(request.env, vec!["TZ=UTC"]);
        assert_eq!(request.restart.as_deref(), Some("unless-stopped"));
        assert!(request.command.is_empty());
    }

    #[test]
    fn accepts_bare_and_run_prefixed_forms() {
        assert_eq!(parse_run_command("nginx").unwrap().image, "nginx");
        assert_eq!(parse_run_command("run nginx").unwrap().image, "nginx");
        assert_eq!(
            parse_run_command("docker run nginx").unwrap().image,
            "nginx"
        );
    }

    #[test]
    fn forces_detach_when_omitted() {
        let request = parse_run_command("docker run nginx").unwrap();
        assert!(request.detach);
        assert!(request.detach_forced);
    }

    #[test]
    fn trailing_tokens_become_the_command() {
        let request = parse_run_command("docker run alpine sh -c 'echo hi'").unwrap();
        assert_eq!(request.image, "alpine");
        assert_eq!(request.command, vec!["sh", "-c", "echo hi"]);
    }

    #[test]
    fn supports_equals_style_flags() {
        let request =
            parse_run_command("docker run --name=web --network=backend nginx").unwrap();
        assert_eq!(request.name.as_deref(), Some("web"));
        assert_eq!(request.network.as_deref(), Some("backend"));
    }

    #[test]
    fn parses_port_spec_variants() {
        assert_eq!(
            parse_port_spec("80").unwrap(),
            PortMapping {
                container_port: 80,
                host_port: None,
                host_ip: None
            }
        );
        assert_eq!(
            parse_port_spec("127.0.0.1:8080:80").unwrap(),
            PortMapping {
                container_port: 80,
                host_port: Some(8080),
                host_ip: Some("127.0.0.1".to_string())
            }
        );
        assert!(parse_port_spec("a:b").is_err());
    }

    #[test]
    fn rejects_missing_image_and_unknown_flags() {
        assert!(parse_run_command("docker run -d").is_err());
        assert!(parse_run_command("docker run --gpus all nginx").is_err());
        assert!(parse_run_command("").is_err());
        assert!(parse_run_command("docker run --name").is_err());
    }

    #[test]
    fn lowers_to_container_config() {
        let request = parse_run_command(
            "docker run -d -p 8080:80 --rm --privileged -e A=1 --restart always nginx",
        )
        .unwrap();
        let (options, config) = request.to_container_config();

        assert!(options.is_none());
        assert_eq!(config.image.as_deref(), Some("nginx"));
        let host_config = config.host_config.unwrap();
        assert_eq!(host_config.auto_remove, Some(true));
        assert_eq!(host_config.privileged, Some(true));
        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["80/tcp"].as_ref().unwrap();
        assert_eq!(binding[0].host_port.as_deref(), Some("8080"));
    }
}
