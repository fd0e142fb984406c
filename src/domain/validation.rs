use super::{
    error::{ProvisionError, ValidationErrors},
    model::{
        Charset, ConfigRequest, Container, Field, ImageType, InstanceRequest, PortMap,
        ValidInstance,
    },
    port::ContainerResource,
};

const NOT_A_STRING: &str = "Not a valid string value";

/// Non-blank text of a string field, reporting `required` when there is none
fn text<'a>(
    field: &'static str,
    value: &'a Field<String>,
    required: &str,
    errors: &mut ValidationErrors,
) -> Option<&'a str> {
    match value {
        Field::Value(text) if !text.trim().is_empty() => Some(text.as_str()),
        Field::Invalid(_) => {
            errors.add(field, NOT_A_STRING);
            None
        }
        _ => {
            errors.add(field, required);
            None
        }
    }
}

fn validate_image_name(request: &InstanceRequest, errors: &mut ValidationErrors) -> Option<ImageType> {
    let image_name = text(
        "image_name",
        &request.image_name,
        "Please provide the image name",
        errors,
    )?;
    let image = ImageType::from_name(image_name);
    if image.is_none() {
        errors.add("image_name", format!("{image_name} image is not supported"));
    }
    image
}

async fn validate_new_name(
    request: &InstanceRequest,
    resource: &dyn ContainerResource,
    errors: &mut ValidationErrors,
) -> Result<Option<String>, anyhow::Error> {
    let Some(name) = text("name", &request.name, "Please provide the container name", errors)
    else {
        return Ok(None);
    };
    match resource.get_container(name).await? {
        Some(container) if container.is_running() => {
            errors.add(
                "name",
                format!(
                    "[{name}] container already exists, current status: {}",
                    container.status.as_str()
                ),
            );
            Ok(None)
        }
        _ => Ok(Some(name.to_string())),
    }
}

fn validate_ports(request: &InstanceRequest, errors: &mut ValidationErrors) -> Option<PortMap> {
    match request.ports {
        Field::Value(ref ports) if !ports.is_empty() => Some(ports.clone()),
        Field::Invalid(_) => {
            errors.add("ports", "Not a valid port configuration");
            None
        }
        _ => {
            errors.add("ports", "Please provide the port configuration");
            None
        }
    }
}

fn validate_mem_limit(request: &InstanceRequest, errors: &mut ValidationErrors) -> Option<i64> {
    let limit = match request.mem_limit {
        Field::Value(limit) => Some(limit),
        Field::Invalid(serde_json::Value::String(ref raw)) if raw.trim().is_empty() => Some(0),
        Field::Invalid(serde_json::Value::String(ref raw)) => raw.trim().parse().ok(),
        Field::Invalid(_) => None,
        Field::Missing => Some(0),
    };
    let Some(limit) = limit else {
        errors.add("mem_limit", "Not a valid integer value");
        return None;
    };
    match limit {
        0 => {
            errors.add("mem_limit", "Please provide the memory limit");
            None
        }
        limit if limit < 0 => {
            errors.add("mem_limit", "Memory limit must be a positive integer");
            None
        }
        limit => Some(limit),
    }
}

fn validate_database(request: &InstanceRequest, errors: &mut ValidationErrors) -> Option<String> {
    text(
        "database",
        &request.database,
        "Please provide the database name",
        errors,
    )
    .map(String::from)
}

fn validate_charset(request: &InstanceRequest, errors: &mut ValidationErrors) -> Option<Charset> {
    let charset = text(
        "charset",
        &request.charset,
        "Please provide the character set",
        errors,
    )?;
    let known = Charset::from_name(charset);
    if known.is_none() {
        errors.add(
            "charset",
            format!("{charset} character set is not currently supported"),
        );
    }
    known
}

fn validate_root_password(request: &InstanceRequest, errors: &mut ValidationErrors) -> Option<String> {
    match request.root_password {
        Field::Value(ref password) if !password.trim().is_empty() => Some(password.clone()),
        Field::Invalid(_) => {
            errors.add("root_password", NOT_A_STRING);
            None
        }
        _ => None,
    }
}

/// Checks a "create MySQL instance" request.
///
/// Every field is checked and all messages are collected before failing.
/// The only backend access is the lookup of the requested container name:
/// a running container with that name rejects the request, a stopped one
/// does not.
pub async fn validate_instance(
    request: &InstanceRequest,
    resource: &dyn ContainerResource,
) -> Result<ValidInstance, ProvisionError> {
    let mut errors = ValidationErrors::default();

    let image = validate_image_name(request, &mut errors);
    let name = validate_new_name(request, resource, &mut errors).await?;
    let ports = validate_ports(request, &mut errors);
    let mem_limit = validate_mem_limit(request, &mut errors);
    let database = validate_database(request, &mut errors);
    let charset = validate_charset(request, &mut errors);
    let root_password = validate_root_password(request, &mut errors);

    match (image, name, ports, mem_limit, database, charset) {
        (Some(image), Some(name), Some(ports), Some(mem_limit), Some(database), Some(charset))
            if errors.is_empty() =>
        {
            Ok(ValidInstance {
                image,
                name,
                ports,
                mem_limit,
                database,
                charset,
                root_password,
            })
        }
        _ => Err(errors.into()),
    }
}

/// Checks a "configure MySQL" request, returning the existing container it names.
pub async fn validate_config(
    request: &ConfigRequest,
    resource: &dyn ContainerResource,
) -> Result<Container, ProvisionError> {
    let mut errors = ValidationErrors::default();
    let Some(name) = text("name", &request.name, "Please provide the container name", &mut errors)
    else {
        return Err(errors.into());
    };
    match resource.get_container(name).await? {
        Some(container) => Ok(container),
        None => {
            errors.add("name", format!("[{name}] container does not exist"));
            Err(errors.into())
        }
    }
}
