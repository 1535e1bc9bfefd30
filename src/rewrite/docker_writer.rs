//! Line-by-line FROM rewriter shared by the plain-Dockerfile and
//! Compose-build rewrite paths. Ported in spirit from
//! `original_source/pkg/rewrite/write/docker.go`'s field-based scanner:
//! tokenize each `FROM` line by whitespace, skip `--platform=...` flags,
//! leave stage-alias references untouched, and substitute every other
//! image token with the next entry from `images`.

use std::collections::HashSet;

use crate::model::Image;

/// Rewrite every un-aliased `FROM` image in `contents` using `images` in
/// encounter order. Returns `Err((found, expected))` when the file's FROM
/// count doesn't match `images.len()`.
pub fn rewrite_dockerfile(contents: &str, images: &[Image], exclude_tags: bool) -> Result<String, (usize, usize)> {
    let mut stage_names: HashSet<String> = HashSet::new();
    let mut index = 0usize;
    let mut out = String::with_capacity(contents.len());

    for line in contents.lines() {
        let mut fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() > 1 && fields[0].eq_ignore_ascii_case("from") {
            let mut image_field = 1;
            if fields[image_field].starts_with("--") {
                image_field += 1;
            }

            if fields.len() > image_field {
                let token = fields[image_field];
                let rendered;

                if !stage_names.contains(token) {
                    if index >= images.len() {
                        return Err((count_from_lines(contents), images.len()));
                    }
                    let mut image = images[index].clone();
                    if exclude_tags {
                        image.tag.clear();
                    }
                    rendered = image.image_line();
                    fields[image_field] = &rendered;
                    index += 1;
                }

                let stage_field = image_field + 2;
                if fields.len() == stage_field + 1 && fields[stage_field - 1].eq_ignore_ascii_case("as") {
                    stage_names.insert(fields[stage_field].to_string());
                }

                out.push_str(&fields.join(" "));
                out.push('\n');
                continue;
            }
        }

        out.push_str(line);
        out.push('\n');
    }

    if index < images.len() {
        return Err((index, images.len()));
    }

    Ok(out)
}

fn count_from_lines(contents: &str) -> usize {
    contents
        .lines()
        .filter(|line| {
            let mut fields = line.split_whitespace();
            matches!(fields.next(), Some(kw) if kw.eq_ignore_ascii_case("from")) && fields.next().is_some()
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, tag: &str, digest: &str) -> Image {
        Image::new(name, tag, digest)
    }

    #[test]
    fn rewrites_single_from() {
        let out = rewrite_dockerfile("FROM busybox\n", &[image("busybox", "1.30", "abc")], false).unwrap();
        assert_eq!(out, "FROM busybox:1.30@sha256:abc\n");
    }

    #[test]
    fn preserves_stage_alias_reference() {
        let contents = "FROM busybox AS base\nFROM base\nRUN echo hi\n";
        let out = rewrite_dockerfile(contents, &[image("busybox", "1.30", "abc")], false).unwrap();
        assert_eq!(out, "FROM busybox:1.30@sha256:abc AS base\nFROM base\nRUN echo hi\n");
    }

    #[test]
    fn excludes_tag_when_requested() {
        let out = rewrite_dockerfile("FROM busybox\n", &[image("busybox", "1.30", "abc")], true).unwrap();
        assert_eq!(out, "FROM busybox@sha256:abc\n");
    }

    #[test]
    fn skips_platform_flag() {
        let out =
            rewrite_dockerfile("FROM --platform=linux/amd64 busybox\n", &[image("busybox", "1.30", "abc")], false)
                .unwrap();
        assert_eq!(out, "FROM --platform=linux/amd64 busybox:1.30@sha256:abc\n");
    }

    #[test]
    fn too_few_images_is_an_error() {
        let err = rewrite_dockerfile("FROM busybox\nFROM alpine\n", &[image("busybox", "1.30", "abc")], false)
            .unwrap_err();
        assert_eq!(err, (2, 1));
    }
}
