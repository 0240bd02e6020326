// Argument builders for the runtime sub-commands used by the instance manager
// Arguments are passed as a vector, never through a shell

/// Port mysqld listens on inside the container
pub const MYSQL_PORT: &str = "3306";

/// Database created at startup and named in the DSN
pub const DATABASE_NAME: &str = "test";

/// Address the published port is reachable on when running on the host
pub const LOOPBACK_HOST: &str = "127.0.0.1";

const NETWORK_MODE_FORMAT: &str = "--format={{.HostConfig.NetworkMode}}";
const INTERNAL_IP_FORMAT: &str =
    "--format={{range .NetworkSettings.Networks}}{{.IPAddress}}{{end}}";

/// How the launched container is made reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Networking {
    /// Join the named network of the container we are running in
    Join(String),
    /// Publish the mysql port to an ephemeral host port
    Publish,
}

/// Build `run` arguments for a detached mysqld container
pub fn run_args(networking: &Networking, tag: &str) -> Vec<String> {
    let mut args = vec!["run".to_string()];

    match networking {
        Networking::Join(network) => {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        Networking::Publish => {
            args.push("-p".to_string());
            args.push(format!(":{}", MYSQL_PORT));
        }
    }

    args.push("-e".to_string());
    args.push("MYSQL_ALLOW_EMPTY_PASSWORD=1".to_string());
    args.push("-e".to_string());
    args.push(format!("MYSQL_DATABASE={}", DATABASE_NAME));
    args.push("-d".to_string());
    args.push(tag.to_string());

    args
}

/// Inspect the network mode of the container named `hostname`
pub fn network_mode_args(hostname: &str) -> Vec<String> {
    vec![
        "inspect".to_string(),
        NETWORK_MODE_FORMAT.to_string(),
        hostname.to_string(),
    ]
}

/// Inspect the internal IP of `container` on its first network
pub fn internal_ip_args(container: &str) -> Vec<String> {
    vec![
        "inspect".to_string(),
        INTERNAL_IP_FORMAT.to_string(),
        container.to_string(),
    ]
}

/// Inspect the host port bound to the mysql port of `container`
pub fn host_port_args(container: &str) -> Vec<String> {
    let format = format!(
        "--format={{{{range $p, $conf := .NetworkSettings.Ports}}}}{{{{ if eq $p \"{}/tcp\" }}}}{{{{(index $conf 0).HostPort}}}}{{{{end}}}}{{{{end}}}}",
        MYSQL_PORT
    );
    vec!["inspect".to_string(), format, container.to_string()]
}

pub fn kill_args(container: &str) -> Vec<String> {
    vec!["kill".to_string(), container.to_string()]
}

/// Remove a container together with its anonymous volumes
pub fn remove_args(container: &str) -> Vec<String> {
    vec!["rm".to_string(), "-v".to_string(), container.to_string()]
}

/// Strip trailing newlines from runtime output
pub fn chomp(output: &str) -> &str {
    output.trim_end_matches('\n')
}
