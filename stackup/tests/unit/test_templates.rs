//! Nested template rewriting tests

use stack_models::StorageLocator;
use stackup::deploy::template::{NestedTemplates, TemplateUrlPattern};

#[test]
fn test_single_nested_template() {
    let locator = StorageLocator::new("b", "r", "p");
    let body = "  TemplateURL: ./net.yaml\n";

    let refs = TemplateUrlPattern.references(body);
    assert_eq!(refs.len(), 1);
    assert_eq!(locator.object_key(&refs[0].path), "p/net.yaml");
    assert_eq!(
        TemplateUrlPattern.rewrite(body, &locator),
        "  TemplateURL: https://s3-r.amazonaws.com/b/p/net.yaml\n"
    );
}

#[test]
fn test_n_references_rewrite_n_lines() {
    let locator = StorageLocator::new("artifacts", "eu-west-1", "env/dev");
    let body = "\
AWSTemplateFormatVersion: '2010-09-09'
Resources:
  Network:
    Type: AWS::CloudFormation::Stack
    Properties:
      TemplateURL: ./stacks/network.yaml
  Cluster:
    Type: AWS::CloudFormation::Stack
    Properties:
      TemplateURL: ./stacks/cluster.yaml
  Alarms:
    Type: AWS::CloudFormation::Stack
    Properties:
      TemplateURL: ./stacks/alarms.yaml
";

    let refs = TemplateUrlPattern.references(body);
    let paths: Vec<&str> = refs.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["stacks/network.yaml", "stacks/cluster.yaml", "stacks/alarms.yaml"]
    );

    let rewritten = TemplateUrlPattern.rewrite(body, &locator);
    let changed: Vec<(&str, &str)> = body
        .lines()
        .zip(rewritten.lines())
        .filter(|(before, after)| before != after)
        .collect();
    assert_eq!(changed.len(), 3);
    for (before, after) in changed {
        let indent = before.len() - before.trim_start().len();
        assert_eq!(&after[..indent], &before[..indent]);
        assert!(after
            .trim_start()
            .starts_with("TemplateURL: https://s3-eu-west-1.amazonaws.com/artifacts/env/dev/stacks/"));
    }
}

#[test]
fn test_packaging_twice_is_stable() {
    let locator = StorageLocator::new("b", "r", "p");
    let body = "    TemplateURL: ./a.yaml\n";

    let once = TemplateUrlPattern.rewrite(body, &locator);
    assert_eq!(TemplateUrlPattern.rewrite(&once, &locator), once);
}
