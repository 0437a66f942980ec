//! Fixed textual skeletons for generated files
//!
//! Placeholders are written `{{key}}`. Rendering is a pure function of the
//! parameters; nothing here touches the filesystem or the cluster.

use std::collections::BTreeMap;
use std::fmt;

use crate::app::options::RunConfig;
use crate::errors::LaunchError;

/// Identifies one template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    NetlifyConfig,
    VercelConfig,
    PagesWorkflow,
    Dockerfile,
    Deployment,
    Service,
    ConfigMap,
}

impl TemplateId {
    fn skeleton(&self) -> &'static str {
        match self {
            TemplateId::NetlifyConfig => NETLIFY_TOML,
            TemplateId::VercelConfig => VERCEL_JSON,
            TemplateId::PagesWorkflow => PAGES_WORKFLOW,
            TemplateId::Dockerfile => DOCKERFILE,
            TemplateId::Deployment => DEPLOYMENT_YAML,
            TemplateId::Service => SERVICE_YAML,
            TemplateId::ConfigMap => CONFIGMAP_YAML,
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateId::NetlifyConfig => "netlify-config",
            TemplateId::VercelConfig => "vercel-config",
            TemplateId::PagesWorkflow => "pages-workflow",
            TemplateId::Dockerfile => "dockerfile",
            TemplateId::Deployment => "deployment",
            TemplateId::Service => "service",
            TemplateId::ConfigMap => "configmap",
        };
        f.write_str(name)
    }
}

/// Values substituted into templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams(BTreeMap<String, String>);

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Every parameter the built-in templates use
    pub fn from_config(config: &RunConfig) -> Self {
        let build_dir = config.layout.build_dir.to_string_lossy().replace('\\', "/");
        Self::new()
            .with("name", &config.name)
            .with("namespace", &config.cluster.namespace)
            .with("release", &config.cluster.release)
            .with("image", config.cluster.image_ref())
            .with("port", config.cluster.port)
            .with("replicas", config.cluster.replicas)
            .with("build_dir", build_dir)
            .with("branch", &config.hosting.branch)
            .with("node_version", &config.hosting.node_version)
    }
}

/// Substitute `params` into the template's skeleton
pub fn render(template: TemplateId, params: &TemplateParams) -> Result<String, LaunchError> {
    let skeleton = template.skeleton();
    let mut out = String::with_capacity(skeleton.len());
    let mut rest = skeleton;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            LaunchError::Internal(format!("Unterminated placeholder in template {}", template))
        })?;
        let key = &after[..end];
        if !is_placeholder_key(key) {
            // Foreign expression such as `${{ github.sha }}`
            out.push_str(&rest[start..start + end + 4]);
            rest = &after[end + 2..];
            continue;
        }
        let value = params.get(key).ok_or_else(|| {
            LaunchError::Internal(format!(
                "Template {} references unknown parameter '{}'",
                template, key
            ))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

fn is_placeholder_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_lowercase() || b == b'_')
}

const NETLIFY_TOML: &str = r#"# Generated by launchpad. Delete this file to regenerate it.
[build]
  command = "npm run build"
  publish = "{{build_dir}}"

[build.environment]
  NODE_VERSION = "{{node_version}}"

[[headers]]
  for = "/assets/*"
  [headers.values]
    Cache-Control = "public, max-age=31536000, immutable"

[[redirects]]
  from = "/*"
  to = "/404.html"
  status = 404
"#;

const VERCEL_JSON: &str = r#"{
  "$schema": "https://openapi.vercel.sh/vercel.json",
  "buildCommand": "npm run build",
  "outputDirectory": "{{build_dir}}",
  "cleanUrls": true,
  "trailingSlash": false
}
"#;

const PAGES_WORKFLOW: &str = r#"# Generated by launchpad. Delete this file to regenerate it.
name: Deploy docs to GitHub Pages

on:
  push:
    branches: [main]
  workflow_dispatch:

permissions:
  contents: read
  pages: write
  id-token: write

concurrency:
  group: pages
  cancel-in-progress: true

jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - uses: actions/setup-node@v4
        with:
          node-version: {{node_version}}
          cache: npm
      - run: npm ci
      - run: npm run build
      - uses: actions/upload-pages-artifact@v3
        with:
          path: {{build_dir}}

  deploy:
    needs: build
    runs-on: ubuntu-latest
    environment:
      name: github-pages
      url: ${{ steps.deployment.outputs.page_url }}
    steps:
      - id: deployment
        uses: actions/deploy-pages@v4
"#;

const DOCKERFILE: &str = r#"# Generated by launchpad. Delete this file to regenerate it.
FROM node:{{node_version}}-alpine AS build
WORKDIR /app
COPY package*.json ./
RUN npm ci
COPY . .
RUN npm run build

FROM nginx:1.27-alpine
COPY --from=build /app/{{build_dir}} /usr/share/nginx/html
EXPOSE {{port}}
CMD ["nginx", "-g", "daemon off;"]
"#;

const DEPLOYMENT_YAML: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{name}}
  namespace: {{namespace}}
  labels:
    app.kubernetes.io/name: {{name}}
    app.kubernetes.io/instance: {{release}}
    app.kubernetes.io/managed-by: launchpad
spec:
  replicas: {{replicas}}
  selector:
    matchLabels:
      app.kubernetes.io/name: {{name}}
      app.kubernetes.io/instance: {{release}}
  template:
    metadata:
      labels:
        app.kubernetes.io/name: {{name}}
        app.kubernetes.io/instance: {{release}}
    spec:
      containers:
        - name: {{name}}
          image: {{image}}
          imagePullPolicy: IfNotPresent
          ports:
            - containerPort: {{port}}
          readinessProbe:
            httpGet:
              path: /
              port: {{port}}
            initialDelaySeconds: 3
            periodSeconds: 5
          volumeMounts:
            - name: nginx-config
              mountPath: /etc/nginx/conf.d
      volumes:
        - name: nginx-config
          configMap:
            name: {{name}}-nginx
"#;

const SERVICE_YAML: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: {{name}}
  namespace: {{namespace}}
  labels:
    app.kubernetes.io/name: {{name}}
    app.kubernetes.io/instance: {{release}}
    app.kubernetes.io/managed-by: launchpad
spec:
  type: ClusterIP
  selector:
    app.kubernetes.io/name: {{name}}
    app.kubernetes.io/instance: {{release}}
  ports:
    - name: http
      port: 80
      targetPort: {{port}}
"#;

const CONFIGMAP_YAML: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: {{name}}-nginx
  namespace: {{namespace}}
  labels:
    app.kubernetes.io/name: {{name}}
    app.kubernetes.io/instance: {{release}}
    app.kubernetes.io/managed-by: launchpad
data:
  default.conf: |
    server {
      listen {{port}};
      root /usr/share/nginx/html;
      index index.html;
      location / {
        try_files $uri $uri/ $uri.html /index.html;
      }
    }
"#;
