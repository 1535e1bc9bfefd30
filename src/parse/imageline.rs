//! The image-line lexer shared by the Dockerfile and Compose sub-parsers
//! (§4.2.1). Ported in spirit from `original_source/pkg/generate/parse/
//! docker.go`'s `convertImageLineToImage`.

use crate::model::Image;

/// Parse `[host[:port]/]name[:tag][@sha256:digest]` into an [`Image`].
///
/// A `/` resets the tag separator so `localhost:5000/name` is not
/// misread as `name` with tag `5000/name`. The default tag is `latest`,
/// except for `scratch`, which has no registry counterpart and so gets
/// an empty tag.
pub fn parse_image_line(image_line: &str) -> Image {
    let mut tag_separator: Option<usize> = None;
    let mut digest_separator: Option<usize> = None;

    for (i, c) in image_line.char_indices() {
        match c {
            ':' => tag_separator = Some(i),
            '/' => tag_separator = None,
            '@' => {
                digest_separator = Some(i);
                break;
            }
            _ => {}
        }
    }

    match (tag_separator, digest_separator) {
        (Some(t), Some(d)) => {
            // name:tag@sha256:hex
            let name = &image_line[..t];
            let tag = &image_line[t + 1..d];
            let digest = strip_sha256_prefix(&image_line[d + 1..]);
            Image::new(name, tag, digest)
        }
        (Some(t), None) => {
            // name:tag
            let name = &image_line[..t];
            let tag = &image_line[t + 1..];
            Image::new(name, tag, "")
        }
        (None, Some(d)) => {
            // name@sha256:hex
            let name = &image_line[..d];
            let digest = strip_sha256_prefix(&image_line[d + 1..]);
            Image::new(name, "", digest)
        }
        (None, None) => {
            // name
            let tag = if image_line == "scratch" { "" } else { "latest" };
            Image::new(image_line, tag, "")
        }
    }
}

fn strip_sha256_prefix(s: &str) -> &str {
    s.strip_prefix("sha256:").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_defaults_to_latest() {
        let img = parse_image_line("ubuntu");
        assert_eq!(img, Image::new("ubuntu", "latest", ""));
    }

    #[test]
    fn scratch_has_no_tag() {
        let img = parse_image_line("scratch");
        assert_eq!(img, Image::new("scratch", "", ""));
    }

    #[test]
    fn name_with_tag() {
        let img = parse_image_line("ubuntu:18.04");
        assert_eq!(img, Image::new("ubuntu", "18.04", ""));
    }

    #[test]
    fn name_with_digest_only() {
        let img = parse_image_line("ubuntu@sha256:abc123");
        assert_eq!(img, Image::new("ubuntu", "", "abc123"));
    }

    #[test]
    fn name_tag_and_digest() {
        let img = parse_image_line("ubuntu:18.04@sha256:abc123");
        assert_eq!(img, Image::new("ubuntu", "18.04", "abc123"));
    }

    #[test]
    fn port_qualified_name_is_not_misread_as_tag() {
        let img = parse_image_line("localhost:5000/ubuntu:bionic@sha256:abc");
        assert_eq!(img, Image::new("localhost:5000/ubuntu", "bionic", "abc"));
    }

    #[test]
    fn port_qualified_name_without_tag() {
        let img = parse_image_line("localhost:5000/ubuntu");
        assert_eq!(img, Image::new("localhost:5000/ubuntu", "latest", ""));
    }

    proptest::proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(s in "[a-zA-Z0-9:/@._-]{0,64}") {
            let _ = parse_image_line(&s);
        }

        #[test]
        fn image_line_round_trips_name_tag(name in "[a-z][a-z0-9-]{0,20}", tag in "[a-z0-9][a-z0-9.-]{0,20}") {
            let line = format!("{name}:{tag}");
            let img = parse_image_line(&line);
            proptest::prop_assert_eq!(&img.name, &name);
            proptest::prop_assert_eq!(&img.tag, &tag);
            proptest::prop_assert_eq!(&img.digest, "");
        }
    }
}
