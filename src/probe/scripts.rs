//! PowerShell payloads for each probe.
//!
//! Every script ends by piping a hashtable through `ConvertTo-Json` so the
//! evaluators always receive a parseable object, and user-supplied values
//! are embedded single-quoted with `'` doubled.

use crate::registry_path::{
    escape_ps_single_quoted, normalize_registry_path, normalize_value_name,
    to_powershell_registry_path,
};

/// Runs *on the remote machine*; success primarily means "remote execution
/// works", which is why no external address is pinged.
pub fn ping_script() -> String {
    r#"@{
  reachable = $true
  computerName = $env:COMPUTERNAME
  timestamp = (Get-Date).ToString('o')
} | ConvertTo-Json"#
        .to_string()
}

/// Reads a registry value through the .NET registry API (exact hive/value
/// semantics, remote-safe) with a registry-provider fallback for paths
/// outside the known hives. Without a value name it degrades to a bare
/// key-existence test.
pub fn registry_value_script(registry_path: &str, value_name: Option<&str>) -> String {
    let stored = normalize_registry_path(registry_path);
    let ps_path = to_powershell_registry_path(&stored);
    let safe_ps_path = escape_ps_single_quoted(&ps_path);
    let safe_stored = escape_ps_single_quoted(&stored);

    match normalize_value_name(value_name) {
        Some(name) => {
            let safe_name = escape_ps_single_quoted(&name);
            format!(
                r#"$p = '{safe_ps_path}'
$stored = '{safe_stored}'
$n = '{safe_name}'
function Get-RegistryBaseKey([string]$hive) {{
  switch ($hive.ToUpperInvariant()) {{
    'HKEY_LOCAL_MACHINE' {{ return [Microsoft.Win32.Registry]::LocalMachine }}
    'HKEY_CURRENT_USER' {{ return [Microsoft.Win32.Registry]::CurrentUser }}
    'HKEY_CLASSES_ROOT' {{ return [Microsoft.Win32.Registry]::ClassesRoot }}
    'HKEY_USERS' {{ return [Microsoft.Win32.Registry]::Users }}
    'HKEY_CURRENT_CONFIG' {{ return [Microsoft.Win32.Registry]::CurrentConfig }}
    default {{ return $null }}
  }}
}}

try {{
  if ($stored -match '^(HKEY_[A-Z_]+)\\(.*)$') {{
    $hive = $Matches[1]
    $subKey = $Matches[2]
    $base = Get-RegistryBaseKey $hive
    if ($null -eq $base) {{
      @{{ path = $stored; valueName = $n; exists = $false; error = "Unsupported hive: $hive" }} | ConvertTo-Json
    }} else {{
      $key = $base.OpenSubKey($subKey)
      if ($null -eq $key) {{
        @{{ path = $stored; valueName = $n; exists = $false }} | ConvertTo-Json
      }} else {{
        $val = $key.GetValue($n, $null)
        if ($null -eq $val) {{
          @{{ path = $stored; valueName = $n; exists = $false }} | ConvertTo-Json
        }} else {{
          $kind = $key.GetValueKind($n).ToString()
          $type = $val.GetType().FullName
          @{{ path = $stored; valueName = $n; exists = $true; value = $val; valueKind = $kind; valueType = $type }} | ConvertTo-Json -Depth 10
        }}
        $key.Close() | Out-Null
      }}
    }}
  }} else {{
    if (Test-Path -Path $p) {{
      try {{
        $item = Get-ItemProperty -Path $p -Name $n -ErrorAction Stop
        $val = $item.$n
        $type = $null
        if ($null -ne $val) {{ $type = $val.GetType().FullName }}
        @{{ path = $stored; valueName = $n; exists = $true; value = $val; valueType = $type }} | ConvertTo-Json -Depth 10
      }} catch {{
        @{{ path = $stored; valueName = $n; exists = $false }} | ConvertTo-Json
      }}
    }} else {{
      @{{ path = $stored; valueName = $n; exists = $false }} | ConvertTo-Json
    }}
  }}
}} catch {{
  @{{ path = $stored; valueName = $n; exists = $false; error = $_.Exception.Message }} | ConvertTo-Json
}}"#
            )
        }
        None => format!(
            r#"$p = '{safe_ps_path}'
$stored = '{safe_stored}'
@{{ path = $stored; exists = (Test-Path -Path $p) }} | ConvertTo-Json"#
        ),
    }
}

pub fn file_info_script(file_path: &str) -> String {
    let safe_path = escape_ps_single_quoted(file_path);
    format!(
        r#"if (Test-Path -Path '{safe_path}') {{
  $file = Get-Item -Path '{safe_path}'
  $isDirectory = $file.PSIsContainer
  $sizeBytes = $null
  if (-not $isDirectory -and $file -is [System.IO.FileInfo]) {{
    $sizeBytes = $file.Length
  }}
  @{{
    path = '{safe_path}'
    exists = $true
    name = $file.Name
    fullPath = $file.FullName
    isDirectory = $isDirectory
    sizeBytes = $sizeBytes
    createdTime = $file.CreationTime.ToString('o')
    modifiedTime = $file.LastWriteTime.ToString('o')
    isReadOnly = $file.IsReadOnly
    attributes = $file.Attributes.ToString()
  }} | ConvertTo-Json
}} else {{
  @{{ path = '{safe_path}'; exists = $false }} | ConvertTo-Json
}}"#
    )
}

/// Looks a service up by name, or by the executable backing it when only a
/// path is configured. With neither identifier the script reports absence
/// and the evaluator fails the check.
pub fn service_info_script(service_name: Option<&str>, executable_path: Option<&str>) -> String {
    if let Some(name) = service_name.map(str::trim).filter(|s| !s.is_empty()) {
        let safe_name = escape_ps_single_quoted(name);
        return format!(
            r#"$svc = Get-Service -Name '{safe_name}' -ErrorAction SilentlyContinue
if ($svc) {{
  @{{
    serviceName = $svc.Name
    exists = $true
    status = $svc.Status.ToString()
    displayName = $svc.DisplayName
    startType = $svc.StartType.ToString()
  }} | ConvertTo-Json
}} else {{
  @{{ serviceName = '{safe_name}'; exists = $false }} | ConvertTo-Json
}}"#
        );
    }

    if let Some(exe) = executable_path.map(str::trim).filter(|s| !s.is_empty()) {
        let safe_exe = escape_ps_single_quoted(exe);
        return format!(
            r#"$svc = Get-CimInstance Win32_Service | Where-Object {{ $_.PathName -like '*{safe_exe}*' }} | Select-Object -First 1
if ($svc) {{
  @{{
    serviceName = $svc.Name
    exists = $true
    status = $svc.State
    displayName = $svc.DisplayName
    startType = $svc.StartMode
  }} | ConvertTo-Json
}} else {{
  @{{ executablePath = '{safe_exe}'; exists = $false }} | ConvertTo-Json
}}"#
        );
    }

    r#"@{ exists = $false } | ConvertTo-Json"#.to_string()
}

/// Parses the `quser` session table; a non-zero exit means nobody is
/// logged on.
pub fn current_user_script() -> String {
    r#"$users = quser 2>&1
if ($LASTEXITCODE -eq 0) {
  $users | Select-Object -Skip 1 | ForEach-Object {
    $line = $_ -replace '\s+', ','
    $parts = $line -split ','
    @{
      Username = $parts[0]
      SessionName = $parts[1]
      ID = $parts[2]
      State = $parts[3]
      IdleTime = $parts[4]
      LogonTime = $parts[5..$parts.Length] -join ' '
    }
  } | ConvertTo-Json
} else {
  @{ NoUserLoggedIn = $true } | ConvertTo-Json
}"#
    .to_string()
}

pub fn last_user_script() -> String {
    r#"$lastUser = Get-ItemProperty -Path 'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\Authentication\LogonUI' -Name 'LastLoggedOnUser' -ErrorAction SilentlyContinue
if ($lastUser) {
  @{ LastUser = $lastUser.LastLoggedOnUser } | ConvertTo-Json
} else {
  @{ LastUser = 'Unknown' } | ConvertTo-Json
}"#
    .to_string()
}

pub fn system_info_script() -> String {
    r#"$os = Get-CimInstance Win32_OperatingSystem
$cs = Get-CimInstance Win32_ComputerSystem
$lastBoot = $os.LastBootUpTime

@{
  ComputerName = $cs.Name
  Manufacturer = $cs.Manufacturer
  Model = $cs.Model
  TotalMemoryGB = [math]::Round($cs.TotalPhysicalMemory / 1GB, 2)
  OSVersion = $os.Caption
  OSArchitecture = $os.OSArchitecture
  LastBootTime = $lastBoot.ToString('o')
  UptimeDays = [math]::Round(((Get-Date) - $lastBoot).TotalDays, 2)
} | ConvertTo-Json"#
        .to_string()
}
