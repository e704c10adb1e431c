use crate::error::IntegrityError;
use crate::tokenizer::tokenize;

/// `docker run` flags that take no value.
const BOOL_FLAGS: &[&str] = &[
    "--rm",
    "--detach",
    "-d",
    "--interactive",
    "-i",
    "--tty",
    "-t",
    "--read-only",
    "--privileged",
    "--init",
    "--no-healthcheck",
];

/// `docker run` flags that consume the following token as their value.
const VALUE_FLAGS: &[&str] = &[
    "--name",
    "--network",
    "--volume",
    "-v",
    "--env",
    "-e",
    "--entrypoint",
    "--workdir",
    "-w",
    "--user",
    "-u",
    "--publish",
    "-p",
    "--mount",
    "--label",
    "-l",
    "--cpus",
    "--memory",
    "-m",
    "--restart",
    "--platform",
    "--add-host",
    "--hostname",
    "-h",
    "--pull",
    "--bin",
];

/// A parsed `docker run` invocation: the flag tokens seen before the image,
/// the image reference itself, and whatever args follow it (a command
/// override for the container's entrypoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerRunCommand {
    pub flags: Vec<String>,
    pub image: String,
    pub trailing: Vec<String>,
}

fn looks_like_flag(token: &str) -> bool {
    token.starts_with('-') && token.len() > 1
}

/// Parses the tokens following `docker run` (fail-closed per §4.6): a
/// conservative table enumerates known boolean and value-taking flags;
/// `--flag=value` is always accepted regardless of the table; `--` ends flag
/// parsing; the image is the first non-flag token. An unrecognized flag is a
/// hard error rather than a guess at whether it takes a value.
pub fn parse_docker_run(args: &[String]) -> Result<DockerRunCommand, IntegrityError> {
    let mut i = 0;
    let mut end_of_flags = false;

    while i < args.len() {
        let token = &args[i];

        if !end_of_flags && token == "--" {
            end_of_flags = true;
            i += 1;
            continue;
        }

        if end_of_flags || !looks_like_flag(token) {
            let image = token.clone();
            let flags = args[..i].to_vec();
            let trailing = args[i + 1..].to_vec();
            return Ok(DockerRunCommand {
                flags,
                image,
                trailing,
            });
        }

        if token.contains('=') {
            i += 1;
            continue;
        }
        if BOOL_FLAGS.contains(&token.as_str()) {
            i += 1;
            continue;
        }
        if VALUE_FLAGS.contains(&token.as_str()) {
            i += 1;
            if i >= args.len() {
                return Err(IntegrityError::UnknownFlag(format!(
                    "flag '{token}' requires a value but none was given"
                )));
            }
            i += 1;
            continue;
        }

        return Err(IntegrityError::UnknownFlag(format!(
            "unrecognized docker run flag '{token}' — if it is meant as a positional \
             argument, pass it after '--'"
        )));
    }

    Err(IntegrityError::UnknownFlag(
        "docker run command has no image".to_string(),
    ))
}

/// A command recognized and parsed by the tokenizer: either an `npx`
/// invocation (args passed through verbatim to the npm runner) or a parsed
/// `docker run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Npx { args: Vec<String> },
    DockerRun(DockerRunCommand),
}

/// Tokenizes `command_line` and recognizes `npx ...` or `docker run ...`.
/// Any other program name is `unsupported-command` (§4.6 names only these
/// two forms).
pub fn parse(command_line: &str) -> Result<ParsedCommand, IntegrityError> {
    let tokens = tokenize(command_line)?;
    match tokens.split_first() {
        Some((program, rest)) if program == "npx" => Ok(ParsedCommand::Npx {
            args: rest.to_vec(),
        }),
        Some((program, rest)) if program == "docker" && rest.first().map(String::as_str) == Some("run") => {
            Ok(ParsedCommand::DockerRun(parse_docker_run(&rest[1..])?))
        }
        Some((program, _)) => Err(IntegrityError::UnsupportedCommand(program.clone())),
        None => Err(IntegrityError::UnsupportedCommand(String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_npx_invocation() {
        let parsed = parse("npx -y some-mcp-server --flag").unwrap();
        match parsed {
            ParsedCommand::Npx { args } => {
                assert_eq!(args, vec!["-y", "some-mcp-server", "--flag"])
            }
            other => panic!("expected Npx, got {other:?}"),
        }
    }

    #[test]
    fn parses_docker_run_with_known_flags() {
        let parsed = parse("docker run --rm -e FOO=bar alpine:latest echo hi").unwrap();
        match parsed {
            ParsedCommand::DockerRun(cmd) => {
                assert_eq!(cmd.image, "alpine:latest");
                assert_eq!(cmd.trailing, vec!["echo", "hi"]);
            }
            other => panic!("expected DockerRun, got {other:?}"),
        }
    }

    #[test]
    fn flag_equals_value_is_always_accepted() {
        let cmd = parse_docker_run(&[
            "--totally-unknown=value".to_string(),
            "alpine:latest".to_string(),
        ])
        .unwrap();
        assert_eq!(cmd.image, "alpine:latest");
    }

    #[test]
    fn double_dash_ends_flag_parsing() {
        let cmd = parse_docker_run(&["--".to_string(), "--not-a-flag".to_string()]).unwrap();
        assert_eq!(cmd.image, "--not-a-flag");
    }

    #[test]
    fn unknown_flag_is_a_hard_error() {
        let err = parse_docker_run(&["--mystery".to_string(), "alpine:latest".to_string()])
            .unwrap_err();
        assert!(matches!(err, IntegrityError::UnknownFlag(_)));
    }

    #[test]
    fn unsupported_program_is_rejected() {
        assert!(parse("bash -c 'echo hi'").is_err());
    }

    #[test]
    fn value_flag_missing_its_value_is_an_error() {
        assert!(parse_docker_run(&["--name".to_string()]).is_err());
    }
}
