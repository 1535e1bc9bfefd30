//! Dockerfile sub-parser (§4.2.2). Scans line by line for `ARG` and `FROM`,
//! tracking global args, stage aliases, and position. Ported in spirit from
//! `original_source/pkg/generate/parse/docker.go`.

use std::collections::{HashMap, HashSet};

use crate::error::ParseError;
use crate::model::{DockerfileImageRef, Image};

use super::imageline::parse_image_line;

/// Scan a Dockerfile's contents, expanding `FROM` images against
/// `build_args ∪ global_args` (build args win), and emit one
/// [`DockerfileImageRef`] per distinct base image in encounter order.
///
/// `build_args` come from the calling Compose service, if any; pass an
/// empty map when parsing a standalone Dockerfile.
pub fn parse_dockerfile(
    path: &str,
    contents: &str,
    build_args: &HashMap<String, String>,
) -> Result<Vec<DockerfileImageRef>, ParseError> {
    let mut global_args: HashMap<String, String> = HashMap::new();
    let mut stage_names: HashSet<String> = HashSet::new();
    let mut global_context = true;
    let mut position = 0usize;
    let mut refs = Vec::new();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let Some(keyword) = fields.next() else { continue };
        let rest: Vec<&str> = fields.collect();

        match keyword.to_ascii_lowercase().as_str() {
            "arg" if global_context => {
                parse_arg_line(&rest, &mut global_args);
            }
            "from" => {
                global_context = false;
                handle_from_line(path, &rest, &global_args, build_args, &stage_names, &mut position, &mut refs)?;

                if let Some(stage) = from_stage_alias(&rest) {
                    stage_names.insert(stage.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(refs)
}

fn parse_arg_line(rest: &[&str], global_args: &mut HashMap<String, String>) {
    let raw = rest.join(" ");
    if raw.is_empty() {
        return;
    }

    if let Some((var, val)) = raw.split_once('=') {
        global_args.insert(strip_quotes(var), strip_quotes(val));
    } else {
        global_args.insert(strip_quotes(&raw), String::new());
    }
}

/// Strip a single pair of surrounding double quotes, Dockerfile-style.
fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Pull the image token and (if present) the trailing `AS <stage>` out of
/// the tokens following `FROM`, skipping any leading `--flag=value` tokens.
fn from_image_token<'a>(rest: &'a [&'a str]) -> Option<&'a str> {
    rest.iter().find(|t| !t.starts_with("--")).copied()
}

fn from_stage_alias<'a>(rest: &'a [&'a str]) -> Option<&'a str> {
    // FROM [--platform=...] <image> AS <stage>
    let mut iter = rest.iter().skip_while(|t| t.starts_with("--"));
    let _image = iter.next()?;
    let as_kw = iter.next()?;
    if as_kw.eq_ignore_ascii_case("as") {
        iter.next().copied()
    } else {
        None
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_from_line(
    path: &str,
    rest: &[&str],
    global_args: &HashMap<String, String>,
    build_args: &HashMap<String, String>,
    stage_names: &HashSet<String>,
    position: &mut usize,
    refs: &mut Vec<DockerfileImageRef>,
) -> Result<(), ParseError> {
    let Some(image_token) = from_image_token(rest) else {
        return Err(ParseError::MissingFromOperand { path: path.to_string() });
    };

    if stage_names.contains(image_token) {
        // FROM <earlier stage>: not a new base image.
        return Ok(());
    }

    let expanded = expand_variables(image_token, global_args, build_args);
    let image: Image = parse_image_line(&expanded);

    refs.push(DockerfileImageRef {
        image,
        path: path.to_string(),
        position: *position,
    });
    *position += 1;

    Ok(())
}

/// Expand `$VAR`/`${VAR}` against `build_args ∪ global_args`, build args
/// winning. Unknown variables expand to the empty string.
fn expand_variables(
    field: &str,
    global_args: &HashMap<String, String>,
    build_args: &HashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(field.len());
    let chars: Vec<char> = field.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '$' {
            if chars.get(i + 1) == Some(&'{') {
                if let Some(end) = chars[i + 2..].iter().position(|&c| c == '}') {
                    let name: String = chars[i + 2..i + 2 + end].iter().collect();
                    out.push_str(&lookup(&name, global_args, build_args));
                    i = i + 2 + end + 1;
                    continue;
                }
            } else {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                if end > start {
                    let name: String = chars[start..end].iter().collect();
                    out.push_str(&lookup(&name, global_args, build_args));
                    i = end;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn lookup(
    name: &str,
    global_args: &HashMap<String, String>,
    build_args: &HashMap<String, String>,
) -> String {
    match global_args.get(name) {
        None => String::new(),
        Some(global_val) => build_args.get(name).cloned().unwrap_or_else(|| global_val.clone()),
    }
}
